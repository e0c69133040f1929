use std::{collections::VecDeque, fmt};

use common::models::SignalResult;

pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Broadcast to presenters whenever the AI flow produces something.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Signal(SignalResult),
    Failure { pair: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PairFilter {
    #[default]
    All,
    Pair(String),
}

impl PairFilter {
    /// `"All"` (any case) or an empty string selects every pair.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            PairFilter::All
        } else {
            PairFilter::Pair(raw.to_string())
        }
    }

    pub fn matches(&self, pair: &str) -> bool {
        match self {
            PairFilter::All => true,
            PairFilter::Pair(p) => p.eq_ignore_ascii_case(pair.trim()),
        }
    }
}

impl fmt::Display for PairFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairFilter::All => f.write_str("All Pairs"),
            PairFilter::Pair(p) => f.write_str(p),
        }
    }
}

/// Newest-first in-memory history of AI signals. Nothing survives a restart.
#[derive(Debug, Clone)]
pub struct SignalFeed {
    entries: VecDeque<SignalResult>,
    capacity: usize,
    filter: PairFilter,
}

impl SignalFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            filter: PairFilter::All,
        }
    }

    pub fn push(&mut self, signal: SignalResult) {
        self.entries.push_front(signal);
        self.entries.truncate(self.capacity);
    }

    pub fn set_filter(&mut self, filter: PairFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> &PairFilter {
        &self.filter
    }

    pub fn visible(&self) -> Vec<&SignalResult> {
        self.entries
            .iter()
            .filter(|s| self.filter.matches(&s.pair))
            .collect()
    }

    /// Distinct pairs seen so far, in first-seen order (oldest first).
    pub fn pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = Vec::new();
        for signal in self.entries.iter().rev() {
            if !pairs.iter().any(|p| p.eq_ignore_ascii_case(&signal.pair)) {
                pairs.push(signal.pair.clone());
            }
        }
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SignalFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::Direction;

    fn signal(pair: &str, price: f64) -> SignalResult {
        SignalResult {
            pair: pair.to_string(),
            direction: Direction::Sell,
            price,
            confidence: 0.5,
            take_profit: price * 0.98,
            stop_loss: price * 1.02,
            duration_minutes: None,
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn newest_first_and_bounded() {
        let mut feed = SignalFeed::new(2);
        feed.push(signal("BTC/USD", 1.0));
        feed.push(signal("ETH/USD", 2.0));
        feed.push(signal("SOL/USD", 3.0));

        let visible = feed.visible();
        assert_eq!(feed.len(), 2);
        assert_eq!(visible[0].pair, "SOL/USD");
        assert_eq!(visible[1].pair, "ETH/USD");
    }

    #[test]
    fn filter_narrows_the_list() {
        let mut feed = SignalFeed::default();
        feed.push(signal("BTC/USD", 1.0));
        feed.push(signal("ETH/USD", 2.0));
        feed.push(signal("BTC/USD", 3.0));

        feed.set_filter(PairFilter::parse("btc/usd"));
        let prices: Vec<f64> = feed.visible().iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![3.0, 1.0]);

        feed.set_filter(PairFilter::parse("All"));
        assert_eq!(feed.visible().len(), 3);
        assert_eq!(feed.pairs(), vec!["BTC/USD".to_string(), "ETH/USD".to_string()]);
    }
}
