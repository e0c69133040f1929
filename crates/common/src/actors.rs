use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    SignalRefreshActor,
    CrowdActor,
}

/// Messages sent from Actors to the Supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Heartbeat(ActorType),
    Shutdown(ActorType),
    Error(ActorType, String),
}

/// Aborts the heartbeat task when dropped, so the pulses stop as soon as the
/// actor's `run` returns, fails, panics or is aborted by the supervisor.
#[must_use = "the heartbeat stops when the guard is dropped"]
pub struct HeartbeatGuard(JoinHandle<()>);

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The trait that all restartable services must implement
#[async_trait]
pub trait Actor: Send + Sync {
    /// The unique name of the actor (e.g., "SignalRefreshActor")
    fn name(&self) -> ActorType;

    /// Instance id, regenerated every time the supervisor respawns the actor.
    fn id(&self) -> Uuid;

    /// The main loop of the actor.
    /// It must periodically send `ControlMessage::Heartbeat` to the supervisor.
    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()>;

    /// Keep the returned guard alive for the whole of `run`.
    fn spawn_heartbeat(&self, supervisor_tx: mpsc::Sender<ControlMessage>) -> HeartbeatGuard {
        let name = self.name();
        HeartbeatGuard(tokio::spawn(async move {
            loop {
                if supervisor_tx
                    .send(ControlMessage::Heartbeat(name))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(HEARTBEAT_PERIOD).await;
            }
        }))
    }
}
