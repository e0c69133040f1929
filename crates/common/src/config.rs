use std::{env, time::Duration};

use thiserror::Error;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_SIGNAL_PAIRS: &[&str] = &["BTC/USD", "ETH/USD", "SOL/USD", "XRP/USD", "DOGE/USD"];
pub const DEFAULT_MOCK_ASSETS: &[&str] = &[
    "EUR/USD",
    "GBP/JPY",
    "AUD/CAD",
    "USD/JPY",
    "EUR/GBP OTC",
    "AUD/USD OTC",
];
pub const DEFAULT_REFRESH_SECS: u64 = 30;
pub const MIN_REFRESH_SECS: u64 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("REFRESH_INTERVAL_SECS must be at least {MIN_REFRESH_SECS}, got {0}")]
    RefreshTooShort(u64),
    #[error("TELEGRAM_CHAT_ID must be a number, got {0:?}")]
    InvalidChatId(String),
    #[error("{0} must list at least one entry")]
    EmptyList(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` disables the AI flow.
    pub gemini: Option<GeminiConfig>,
    pub pairs: Vec<String>,
    pub refresh_interval: Duration,
    pub mock_assets: Vec<String>,
    /// `None` falls back to the console presenter.
    pub telegram: Option<TelegramConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini = non_empty("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_key,
            model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: non_empty("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        let pairs = match non_empty("SIGNAL_PAIRS") {
            Some(raw) => parse_list("SIGNAL_PAIRS", &raw)?,
            None => DEFAULT_SIGNAL_PAIRS.iter().map(|s| s.to_string()).collect(),
        };

        let mock_assets = match non_empty("MOCK_ASSETS") {
            Some(raw) => parse_list("MOCK_ASSETS", &raw)?,
            None => DEFAULT_MOCK_ASSETS.iter().map(|s| s.to_string()).collect(),
        };

        let refresh_secs = match non_empty("REFRESH_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "REFRESH_INTERVAL_SECS",
                    value: raw.clone(),
                })?,
            None => DEFAULT_REFRESH_SECS,
        };
        if refresh_secs < MIN_REFRESH_SECS {
            return Err(ConfigError::RefreshTooShort(refresh_secs));
        }

        let telegram = match non_empty("TELEGRAM_BOT_TOKEN") {
            Some(token) => {
                let chat_id = match non_empty("TELEGRAM_CHAT_ID") {
                    Some(raw) => Some(
                        raw.trim()
                            .parse::<i64>()
                            .map_err(|_| ConfigError::InvalidChatId(raw.clone()))?,
                    ),
                    None => None,
                };
                Some(TelegramConfig { token, chat_id })
            }
            None => None,
        };

        Ok(Self {
            gemini,
            pairs,
            refresh_interval: Duration::from_secs(refresh_secs),
            mock_assets,
            telegram,
        })
    }
}

fn parse_list(key: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        return Err(ConfigError::EmptyList(key));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_variable() {
        let config = config_from(&[]).unwrap();

        assert!(config.gemini.is_none());
        assert!(config.telegram.is_none());
        assert_eq!(config.pairs.len(), DEFAULT_SIGNAL_PAIRS.len());
        assert_eq!(config.mock_assets[0], "EUR/USD");
        assert_eq!(config.refresh_interval, Duration::from_secs(DEFAULT_REFRESH_SECS));
    }

    #[test]
    fn gemini_enabled_by_api_key() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_BASE_URL", "http://localhost:8080/"),
        ])
        .unwrap();

        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key, "secret");
        assert_eq!(gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(gemini.base_url, "http://localhost:8080");
    }

    #[test]
    fn pair_list_is_trimmed() {
        let config = config_from(&[("SIGNAL_PAIRS", " BTC/USD, ,ETH/USD ")]).unwrap();
        assert_eq!(config.pairs, vec!["BTC/USD".to_string(), "ETH/USD".to_string()]);

        assert_eq!(
            config_from(&[("SIGNAL_PAIRS", " , ")]),
            Err(ConfigError::EmptyList("SIGNAL_PAIRS"))
        );
    }

    #[test]
    fn refresh_interval_is_validated() {
        assert_eq!(
            config_from(&[("REFRESH_INTERVAL_SECS", "2")]),
            Err(ConfigError::RefreshTooShort(2))
        );
        assert!(matches!(
            config_from(&[("REFRESH_INTERVAL_SECS", "soon")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert_eq!(
            config_from(&[("REFRESH_INTERVAL_SECS", "60")])
                .unwrap()
                .refresh_interval,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn telegram_chat_id_must_be_numeric() {
        assert_eq!(
            config_from(&[("TELEGRAM_BOT_TOKEN", "t"), ("TELEGRAM_CHAT_ID", "abc")]),
            Err(ConfigError::InvalidChatId("abc".to_string()))
        );

        let telegram = config_from(&[("TELEGRAM_BOT_TOKEN", "t"), ("TELEGRAM_CHAT_ID", "-1001")])
            .unwrap()
            .telegram
            .unwrap();
        assert_eq!(telegram.chat_id, Some(-1001));
    }
}
