use std::{ops::RangeInclusive, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Local};
use common::models::{Analysis, Expiration, MockSignal, Volatility};
use rand::{Rng, seq::SliceRandom};

use crate::schedule::{end_time, entry_time, protections};

pub const LOADING_MS: RangeInclusive<u64> = 3000..=7000;
pub const STATUS_PERIOD: Duration = Duration::from_millis(1500);
pub const SUCCESS_PROBABILITY: f64 = 0.8;
pub const ASSERTIVENESS: RangeInclusive<u8> = 69..=96;
pub const COOLDOWN_SECS: u32 = 15;

pub const EXPIRATIONS: [Expiration; 2] = [Expiration::OneMinute, Expiration::FiveMinutes];
pub const CLASSIC_EXPIRATIONS: [Expiration; 3] = [
    Expiration::OneMinute,
    Expiration::TwoMinutes,
    Expiration::FiveMinutes,
];
pub const VOLATILITIES: [Volatility; 3] = [Volatility::Baixa, Volatility::Media, Volatility::Alta];

pub const STATUS_MESSAGES: [&str; 5] = [
    "Conectando aos servidores da corretora...",
    "Analisando padrões de velas...",
    "Calculando indicadores técnicos...",
    "Verificando volatilidade do ativo...",
    "Confirmando ponto de entrada...",
];

pub fn loading_duration<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(LOADING_MS))
}

pub fn analysis<R: Rng>(rng: &mut R) -> Analysis {
    if rng.gen_bool(0.5) {
        Analysis::Compra
    } else {
        Analysis::Venda
    }
}

/// Signal for the selected asset, as shown after a successful analysis.
pub fn build_signal<R: Rng>(rng: &mut R, asset: &str, now: DateTime<Local>) -> MockSignal {
    let expiration = *EXPIRATIONS.choose(rng).unwrap_or(&Expiration::OneMinute);
    let entry_at = entry_time(expiration, &now);
    let (protection1_at, protection2_at) = protections(&entry_at);

    MockSignal {
        asset: asset.to_string(),
        end_at: Some(end_time(expiration, &entry_at)),
        entry_at,
        expiration,
        analysis: analysis(rng),
        protection1_at,
        protection2_at: Some(protection2_at),
        volatility: VOLATILITIES.choose(rng).copied(),
        assertiveness: Some(rng.gen_range(ASSERTIVENESS)),
    }
}

/// Instant variant: random asset, no delay, no cooldown. `None` when there
/// are no assets to draw from.
pub fn classic_signal<R: Rng>(
    rng: &mut R,
    assets: &[String],
    now: DateTime<Local>,
) -> Option<MockSignal> {
    let asset = assets.choose(rng)?;
    let expiration = *CLASSIC_EXPIRATIONS.choose(rng)?;
    let entry_at = now + ChronoDuration::minutes(1);
    let (protection1_at, protection2_at) = protections(&entry_at);

    Some(MockSignal {
        asset: asset.clone(),
        entry_at,
        expiration,
        analysis: analysis(rng),
        protection1_at,
        protection2_at: Some(protection2_at),
        volatility: None,
        end_at: None,
        assertiveness: None,
    })
}
