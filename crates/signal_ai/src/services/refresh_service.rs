use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::info;
use uuid::Uuid;

use crate::services::signal_desk::SignalDesk;

/// Initial batch at startup, then one batch per interval. Each batch is
/// awaited before the next tick and late ticks are skipped, so batches never
/// overlap.
pub struct SignalRefreshService {
    id: Uuid,
    desk: Arc<SignalDesk>,
    pairs: Vec<String>,
    interval: Duration,
}

#[async_trait]
impl Actor for SignalRefreshService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::SignalRefreshActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());

        info!(
            "Starting Signal Refresh Service {} for {} pairs every {:?}",
            self.id,
            self.pairs.len(),
            self.interval
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // The first tick completes immediately: that is the initial batch.
            ticker.tick().await;
            let succeeded = self.desk.refresh_all(&self.pairs).await;

            if succeeded == 0 && !self.pairs.is_empty() {
                let msg = format!("No pair refreshed successfully ({} tried)", self.pairs.len());
                if supervisor_tx
                    .send(ControlMessage::Error(self.name(), msg))
                    .await
                    .is_err()
                {
                    return Ok(());
                }
            }
        }
    }
}

impl SignalRefreshService {
    pub fn new(desk: Arc<SignalDesk>, pairs: Vec<String>, interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            desk,
            pairs,
            interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conversation::ModelTurn, error::SignalError, feed::FeedEvent,
        services::signal_flow::SignalFlow, traits::MockGenerationBackend,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    #[tokio::test(start_paused = true)]
    async fn runs_initial_batch_then_every_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut mock = MockGenerationBackend::new();
        mock.expect_generate().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ModelTurn::Text(
                r#"{"pair":"BTC/USD","direction":"buy","price":10,"confidence":0.9,
                    "takeProfit":10.2,"stopLoss":9.8,"timestamp":"2025-03-05T14:03:09Z"}"#
                    .to_string(),
            ))
        });

        let (events_tx, mut events_rx) = broadcast::channel(16);
        let desk = Arc::new(SignalDesk::new(SignalFlow::new(Arc::new(mock)), events_tx));
        let mut service = SignalRefreshService::new(
            desk.clone(),
            vec!["BTC/USD".to_string()],
            Duration::from_secs(30),
        );

        let (supervisor_tx, _supervisor_rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { service.run(supervisor_tx).await });

        assert!(matches!(events_rx.recv().await, Ok(FeedEvent::Signal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(31)).await;
        assert!(matches!(events_rx.recv().await, Ok(FeedEvent::Signal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(desk.feed().await.len(), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_is_reported_to_supervisor() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .returning(|_| Err(SignalError::RateLimited));

        let (events_tx, _events_rx) = broadcast::channel(16);
        let desk = Arc::new(SignalDesk::new(SignalFlow::new(Arc::new(mock)), events_tx));
        let mut service =
            SignalRefreshService::new(desk, vec!["BTC/USD".to_string()], Duration::from_secs(30));

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { service.run(supervisor_tx).await });

        loop {
            match supervisor_rx.recv().await {
                Some(ControlMessage::Error(ActorType::SignalRefreshActor, msg)) => {
                    assert!(msg.contains("1 tried"));
                    break;
                }
                Some(_) => continue,
                None => panic!("supervisor channel closed"),
            }
        }

        handle.abort();
    }
}
