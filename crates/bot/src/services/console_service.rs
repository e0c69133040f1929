use mock_flow::CrowdCounters;
use signal_ai::FeedEvent;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::services::telegram_service::render_event;

/// Stand-in presenter when no Telegram token is configured: feed events go to
/// the log instead of a chat.
pub struct ConsoleService {
    crowd: watch::Receiver<CrowdCounters>,
}

impl ConsoleService {
    pub fn new(crowd: watch::Receiver<CrowdCounters>) -> Self {
        Self { crowd }
    }

    pub async fn start(mut self, mut rx: broadcast::Receiver<FeedEvent>) {
        info!("Starting Console Presenter");

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => info!("\n{}", render_event(&event)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Console presenter lagged: missed {} events", n);
                    }
                    Err(_) => {
                        info!("Feed channel closed. Stopping console presenter.");
                        break;
                    }
                },
                changed = self.crowd.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let counters = *self.crowd.borrow_and_update();
                    debug!("{} online, {} winning", counters.active, counters.winning);
                }
            }
        }
    }
}
