use std::{collections::HashMap, sync::Arc, time::Duration};

use mock_flow::{CrowdCounters, MockMachine, Phase, SessionHandle};
use signal_ai::SignalDesk;
use tokio::{
    sync::{Mutex, watch},
    time::{self, Instant},
};
use tracing::{debug, info};

/// Idle sessions untouched for this long are dropped.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

struct SessionEntry {
    handle: Arc<SessionHandle>,
    last_used: Instant,
}

/// Shared by every command handler.
pub struct BotState {
    pub assets: Vec<String>,
    /// `None` when no Gemini key is configured.
    pub desk: Option<Arc<SignalDesk>>,
    pub crowd: watch::Receiver<CrowdCounters>,
    sessions: Mutex<HashMap<i64, SessionEntry>>,
}

impl BotState {
    pub fn new(
        assets: Vec<String>,
        desk: Option<Arc<SignalDesk>>,
        crowd: watch::Receiver<CrowdCounters>,
    ) -> Self {
        Self {
            assets,
            desk,
            crowd,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The chat's mock session, spawned on first use.
    pub async fn session(&self, chat_id: i64) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(chat_id).or_insert_with(|| {
            debug!("Starting mock session for chat {}", chat_id);
            SessionEntry {
                handle: Arc::new(SessionHandle::spawn(MockMachine::from_entropy())),
                last_used: Instant::now(),
            }
        });
        entry.last_used = Instant::now();
        entry.handle.clone()
    }

    /// Drops the chat's session; its timers stop once the last handle is gone.
    pub async fn end_session(&self, chat_id: i64) -> bool {
        self.sessions.lock().await.remove(&chat_id).is_some()
    }

    /// Drops idle sessions not used for `max_idle`. Returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.handle.snapshot().phase != Phase::Idle
                || now.duration_since(entry.last_used) < max_idle
        });
        before - sessions.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Case-insensitive lookup in the configured asset list.
    pub fn resolve_asset(&self, raw: &str) -> Option<&str> {
        let raw = raw.trim();
        self.assets
            .iter()
            .find(|asset| asset.eq_ignore_ascii_case(raw))
            .map(String::as_str)
    }
}

/// Evicts idle sessions once a minute, for as long as the bot runs.
pub async fn sweep_sessions(state: Arc<BotState>) {
    let mut ticker = time::interval(SWEEP_PERIOD);
    loop {
        ticker.tick().await;
        let evicted = state.evict_idle(SESSION_IDLE_TTL).await;
        if evicted > 0 {
            info!(
                "Evicted {} idle mock sessions, {} left",
                evicted,
                state.session_count().await
            );
        }
    }
}
