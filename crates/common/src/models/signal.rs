use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TAKE_PROFIT_FACTOR: f64 = 1.02;
pub const STOP_LOSS_FACTOR: f64 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRequest {
    pub pair: String,
}

impl SignalRequest {
    pub fn new(pair: impl Into<String>) -> Self {
        Self { pair: pair.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeProfitStopLoss {
    pub take_profit: f64,
    pub stop_loss: f64,
}

/// Fixed ±2% band around `price`. Mirrored for sells.
pub fn compute_take_profit_stop_loss(price: f64, direction: Direction) -> TakeProfitStopLoss {
    match direction {
        Direction::Buy => TakeProfitStopLoss {
            take_profit: price * TAKE_PROFIT_FACTOR,
            stop_loss: price * STOP_LOSS_FACTOR,
        },
        Direction::Sell => TakeProfitStopLoss {
            take_profit: price * STOP_LOSS_FACTOR,
            stop_loss: price * TAKE_PROFIT_FACTOR,
        },
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("record does not match the signal schema: {0}")]
    Shape(String),
    #[error("pair mismatch: requested {requested:?}, model returned {returned:?}")]
    PairMismatch { requested: String, returned: String },
    #[error("field {0} is not a finite number")]
    NotFinite(&'static str),
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("durationMinutes must be at least 1")]
    DurationTooShort,
    #[error("timestamp {0:?} is not ISO-8601")]
    BadTimestamp(String),
}

/// Canonical AI signal record. Field names follow the JSON contract (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResult {
    pub pair: String,
    pub direction: Direction,
    pub price: f64,
    pub confidence: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// Only emitted by the newer schema revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub timestamp: String,
}

impl SignalResult {
    /// Checks every constraint serde cannot express.
    pub fn validate(&self, request: &SignalRequest) -> Result<(), SchemaViolation> {
        let requested = request.pair.trim();
        if !self.pair.trim().eq_ignore_ascii_case(requested) {
            return Err(SchemaViolation::PairMismatch {
                requested: requested.to_string(),
                returned: self.pair.clone(),
            });
        }

        for (name, value) in [
            ("price", self.price),
            ("confidence", self.confidence),
            ("takeProfit", self.take_profit),
            ("stopLoss", self.stop_loss),
        ] {
            if !value.is_finite() {
                return Err(SchemaViolation::NotFinite(name));
            }
        }

        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaViolation::ConfidenceOutOfRange(self.confidence));
        }

        if self.duration_minutes == Some(0) {
            return Err(SchemaViolation::DurationTooShort);
        }

        if parse_iso8601(&self.timestamp).is_none() {
            return Err(SchemaViolation::BadTimestamp(self.timestamp.clone()));
        }

        Ok(())
    }

    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        parse_iso8601(&self.timestamp)
    }
}

/// Accepts RFC 3339 and zone-less ISO-8601 date-times (read as UTC).
pub fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
