use chrono::{DateTime, Local};
use common::models::MockSignal;

pub const NOT_STARTED: &str = "--:--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Waiting,
    Running,
    Finished,
}

/// Time left until expiration, recomputed from the wall clock on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    entry_at: DateTime<Local>,
    end_at: DateTime<Local>,
}

impl Countdown {
    pub fn new(entry_at: DateTime<Local>, end_at: DateTime<Local>) -> Self {
        Self { entry_at, end_at }
    }

    /// Only signals that carry an end time get a countdown.
    pub fn for_signal(signal: &MockSignal) -> Option<Self> {
        signal.end_at.map(|end_at| Self::new(signal.entry_at, end_at))
    }

    pub fn phase(&self, now: DateTime<Local>) -> CountdownPhase {
        if now < self.entry_at {
            CountdownPhase::Waiting
        } else if now < self.end_at {
            CountdownPhase::Running
        } else {
            CountdownPhase::Finished
        }
    }

    /// Whole seconds left, rounded up so `00:00` only shows once finished.
    pub fn remaining_secs(&self, now: DateTime<Local>) -> i64 {
        let millis = (self.end_at - now).num_milliseconds().max(0);
        (millis + 999) / 1000
    }

    pub fn display(&self, now: DateTime<Local>) -> String {
        match self.phase(now) {
            CountdownPhase::Waiting => NOT_STARTED.to_string(),
            CountdownPhase::Finished => "00:00".to_string(),
            CountdownPhase::Running => {
                let secs = self.remaining_secs(now);
                format!("{:02}:{:02}", secs / 60, secs % 60)
            }
        }
    }
}
