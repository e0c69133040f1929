use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

pub const FAILURE_NOTICE_WINDOW: Duration = Duration::from_secs(60);

/// Lets at most one notification per key through each window.
pub struct NotificationThrottle {
    window: Duration,
    last_sent: HashMap<String, Instant>,
}

impl NotificationThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: HashMap::new(),
        }
    }

    /// Entries older than the window are dropped on every call.
    pub fn allow(&mut self, key: &str, now: Instant) -> bool {
        let window = self.window;
        self.last_sent
            .retain(|_, last| now.duration_since(*last) < window);

        match self.last_sent.get(key) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                self.last_sent.insert(key.to_string(), now);
                true
            }
        }
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(FAILURE_NOTICE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_notice_per_key_per_window() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(60));
        let start = Instant::now();

        assert!(throttle.allow("BTC/USD", start));
        assert!(!throttle.allow("BTC/USD", start + Duration::from_secs(30)));
        assert!(throttle.allow("ETH/USD", start + Duration::from_secs(30)));
        assert!(throttle.allow("BTC/USD", start + Duration::from_secs(60)));
    }

    #[test]
    fn expired_keys_are_pruned() {
        let mut throttle = NotificationThrottle::new(Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..100 {
            assert!(throttle.allow(&format!("PAIR{}", i), start));
        }
        assert_eq!(throttle.last_sent.len(), 100);

        assert!(throttle.allow("BTC/USD", start + Duration::from_secs(61)));
        assert_eq!(throttle.last_sent.len(), 1);
    }
}
