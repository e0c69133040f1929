use common::models::{SignalRequest, SignalResult};
use futures_util::future::join_all;
use tokio::{
    sync::{Mutex, RwLock, broadcast},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    error::SignalError,
    feed::{FeedEvent, PairFilter, SignalFeed},
    services::signal_flow::SignalFlow,
    single_flight::{SingleFlight, pair_key},
    throttle::NotificationThrottle,
};

/// Front door of the AI flow. Every caller (startup batch, periodic refresh,
/// on-demand chat command) goes through `request`, so the in-flight guard
/// and the failure policy are the same everywhere.
pub struct SignalDesk {
    flow: SignalFlow,
    feed: RwLock<SignalFeed>,
    events_tx: broadcast::Sender<FeedEvent>,
    flights: SingleFlight,
    throttle: Mutex<NotificationThrottle>,
}

impl SignalDesk {
    pub fn new(flow: SignalFlow, events_tx: broadcast::Sender<FeedEvent>) -> Self {
        Self {
            flow,
            feed: RwLock::new(SignalFeed::default()),
            events_tx,
            flights: SingleFlight::new(),
            throttle: Mutex::new(NotificationThrottle::default()),
        }
    }

    pub async fn request(&self, pair: &str) -> Result<SignalResult, SignalError> {
        let request = SignalRequest::new(pair.trim());

        let Some(_guard) = self.flights.try_acquire(&request.pair) else {
            debug!("Skipping {}: a request is already in flight", request.pair);
            return Err(SignalError::InFlight(request.pair));
        };

        match self.flow.generate(&request).await {
            Ok(result) => {
                self.feed.write().await.push(result.clone());
                let _ = self.events_tx.send(FeedEvent::Signal(result.clone()));
                Ok(result)
            }
            Err(e) => {
                self.report_failure(&request.pair, &e).await;
                Err(e)
            }
        }
    }

    /// Generates one signal per pair concurrently. Returns how many succeeded.
    pub async fn refresh_all(&self, pairs: &[String]) -> usize {
        let results = join_all(pairs.iter().map(|pair| self.request(pair))).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        info!("Refreshed {}/{} pairs", succeeded, pairs.len());
        succeeded
    }

    async fn report_failure(&self, pair: &str, err: &SignalError) {
        if matches!(err, SignalError::InvalidRequest(_)) {
            debug!("Rejected request for {:?}: {}", pair, err);
            return;
        }

        warn!("Signal generation for {} failed: {}", pair, err);
        if self
            .throttle
            .lock()
            .await
            .allow(&pair_key(pair), Instant::now())
        {
            let _ = self.events_tx.send(FeedEvent::Failure {
                pair: pair.to_string(),
                message: err.to_string(),
            });
        } else {
            debug!("Failure notice for {} suppressed by throttle", pair);
        }
    }

    pub async fn set_filter(&self, filter: PairFilter) {
        self.feed.write().await.set_filter(filter);
    }

    pub async fn feed(&self) -> SignalFeed {
        self.feed.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conversation::{Conversation, ModelTurn},
        traits::{GenerationBackend, MockGenerationBackend},
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn reply_for(pair: &str) -> ModelTurn {
        ModelTurn::Text(format!(
            r#"{{"pair":"{pair}","direction":"sell","price":50,"confidence":0.4,
                "takeProfit":49,"stopLoss":51,"timestamp":"2025-03-05T14:03:09Z"}}"#
        ))
    }

    fn desk(mock: MockGenerationBackend) -> (SignalDesk, broadcast::Receiver<FeedEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (SignalDesk::new(SignalFlow::new(Arc::new(mock)), tx), rx)
    }

    #[tokio::test]
    async fn success_lands_in_feed_and_broadcast() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(reply_for("SOL/USD")));
        let (desk, mut rx) = desk(mock);

        let result = desk.request("SOL/USD").await.unwrap();

        assert_eq!(result.pair, "SOL/USD");
        assert_eq!(desk.feed().await.len(), 1);
        assert!(matches!(rx.recv().await, Ok(FeedEvent::Signal(s)) if s.pair == "SOL/USD"));
    }

    #[tokio::test]
    async fn failures_are_surfaced_once_per_window() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .times(2)
            .returning(|_| Err(SignalError::RateLimited));
        let (desk, mut rx) = desk(mock);

        assert!(desk.request("BTC/USD").await.is_err());
        assert!(desk.request("BTC/USD").await.is_err());

        assert!(matches!(rx.recv().await, Ok(FeedEvent::Failure { pair, .. }) if pair == "BTC/USD"));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert!(desk.feed().await.is_empty());
    }

    #[tokio::test]
    async fn spellings_of_one_pair_share_the_failure_window() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .times(3)
            .returning(|_| Err(SignalError::RateLimited));
        let (desk, mut rx) = desk(mock);

        assert!(desk.request("BTC/USD").await.is_err());
        assert!(desk.request("btc/usd").await.is_err());
        assert!(desk.request(" Btc/Usd ").await.is_err());

        let mut notices = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, FeedEvent::Failure { .. }));
            notices += 1;
        }
        assert_eq!(notices, 1);
    }

    #[tokio::test]
    async fn refresh_all_counts_successes() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate().times(2).returning(|conversation: &Conversation| {
            match &conversation.turns[0] {
                crate::conversation::Turn::User(p) if p.contains("ETH/USD") => {
                    Err(SignalError::EmptyResponse)
                }
                _ => Ok(reply_for("BTC/USD")),
            }
        });
        let (desk, _rx) = desk(mock);

        let pairs = vec!["BTC/USD".to_string(), "ETH/USD".to_string()];
        assert_eq!(desk.refresh_all(&pairs).await, 1);
    }

    struct HeldBackend {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl GenerationBackend for HeldBackend {
        async fn generate(&self, _conversation: &Conversation) -> Result<ModelTurn, SignalError> {
            self.release.notified().await;
            Ok(reply_for("BTC/USD"))
        }
    }

    #[tokio::test]
    async fn overlapping_request_for_same_pair_is_skipped() {
        let release = Arc::new(Notify::new());
        let (tx, mut rx) = broadcast::channel(16);
        let desk = Arc::new(SignalDesk::new(
            SignalFlow::new(Arc::new(HeldBackend {
                release: release.clone(),
            })),
            tx,
        ));

        let first = tokio::spawn({
            let desk = desk.clone();
            async move { desk.request("BTC/USD").await }
        });
        while !desk.flights.is_in_flight("BTC/USD") {
            tokio::task::yield_now().await;
        }

        let second = desk.request("BTC/USD").await;
        assert!(matches!(second, Err(SignalError::InFlight(_))));
        // Overlap is not a service failure: nothing is broadcast for it.
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!desk.flights.is_in_flight("BTC/USD"));
    }
}
