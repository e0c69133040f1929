use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Analysis {
    Compra,
    Venda,
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Analysis::Compra => f.write_str("Compra"),
            Analysis::Venda => f.write_str("Venda"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Volatility {
    Baixa,
    #[serde(rename = "Média")]
    Media,
    Alta,
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volatility::Baixa => f.write_str("Baixa"),
            Volatility::Media => f.write_str("Média"),
            Volatility::Alta => f.write_str("Alta"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expiration {
    OneMinute,
    TwoMinutes,
    FiveMinutes,
}

impl Expiration {
    pub fn minutes(&self) -> i64 {
        match self {
            Expiration::OneMinute => 1,
            Expiration::TwoMinutes => 2,
            Expiration::FiveMinutes => 5,
        }
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiration::OneMinute => f.write_str("1 minuto"),
            Expiration::TwoMinutes => f.write_str("2 minutos"),
            Expiration::FiveMinutes => f.write_str("5 minutos"),
        }
    }
}

/// Client-side fabricated signal. Replaced on every generation, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockSignal {
    pub asset: String,
    pub entry_at: DateTime<Local>,
    pub expiration: Expiration,
    pub analysis: Analysis,
    pub protection1_at: DateTime<Local>,
    pub protection2_at: Option<DateTime<Local>>,
    pub volatility: Option<Volatility>,
    pub end_at: Option<DateTime<Local>>,
    pub assertiveness: Option<u8>,
}

impl MockSignal {
    pub fn entry_time(&self) -> String {
        clock(&self.entry_at)
    }

    pub fn protection1(&self) -> String {
        clock(&self.protection1_at)
    }

    pub fn protection2(&self) -> Option<String> {
        self.protection2_at.as_ref().map(clock)
    }
}

/// `HH:MM` wall-clock label.
pub fn clock(at: &DateTime<Local>) -> String {
    at.format("%H:%M").to_string()
}
