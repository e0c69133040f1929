use std::time::Duration;

use chrono::{DateTime, Local};
use common::models::MockSignal;
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::debug;

use crate::generator::{
    COOLDOWN_SECS, STATUS_MESSAGES, SUCCESS_PROBABILITY, build_signal, loading_duration,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("Selecione um ativo antes de gerar o sinal.")]
    NoAssetSelected,
    #[error("Falha ao analisar o mercado. Tente novamente.")]
    AnalysisFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Signal(MockSignal),
    Failed(MockError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loading {
    pub duration: Duration,
    pub elapsed: Duration,
    pub message_index: usize,
}

impl Loading {
    /// Linear 0..=100 over the loading duration.
    pub fn progress(&self) -> u8 {
        let total = self.duration.as_millis().max(1);
        (self.elapsed.as_millis().min(total) * 100 / total) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading(Loading),
    Cooldown { remaining: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    SelectAsset(String),
    Generate,
    StatusTick,
    Progress(Duration),
    LoadingElapsed,
    CooldownTick,
}

/// What the driver has to schedule after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    BeginLoading(Duration),
    BeginCooldown,
    EndCooldown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub outcome: Option<Outcome>,
    pub selected_asset: Option<String>,
    /// Bumped on every accepted or rejected `Generate`.
    pub generation: u64,
}

impl Snapshot {
    pub fn can_generate(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn status_message(&self) -> Option<&'static str> {
        match self.phase {
            Phase::Loading(loading) => Some(STATUS_MESSAGES[loading.message_index]),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match self.phase {
            Phase::Loading(loading) => Some(loading.progress()),
            _ => None,
        }
    }
}

/// `Idle -> Loading -> {Result, Error} -> Cooldown -> Idle`.
pub struct MockMachine<R: Rng = StdRng> {
    rng: R,
    selected_asset: Option<String>,
    phase: Phase,
    outcome: Option<Outcome>,
    generation: u64,
}

impl MockMachine<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> MockMachine<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            selected_asset: None,
            phase: Phase::Idle,
            outcome: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            outcome: self.outcome.clone(),
            selected_asset: self.selected_asset.clone(),
            generation: self.generation,
        }
    }

    pub fn update(&mut self, msg: Msg, now: DateTime<Local>) -> Command {
        match msg {
            Msg::SelectAsset(asset) => {
                let asset = asset.trim().to_string();
                self.selected_asset = (!asset.is_empty()).then_some(asset);
                Command::None
            }
            Msg::Generate => self.generate(),
            Msg::StatusTick => {
                if let Phase::Loading(loading) = &mut self.phase {
                    loading.message_index = (loading.message_index + 1) % STATUS_MESSAGES.len();
                }
                Command::None
            }
            Msg::Progress(elapsed) => {
                if let Phase::Loading(loading) = &mut self.phase {
                    loading.elapsed = elapsed.min(loading.duration);
                }
                Command::None
            }
            Msg::LoadingElapsed => self.finish_loading(now),
            Msg::CooldownTick => self.tick_cooldown(),
        }
    }

    fn generate(&mut self) -> Command {
        if self.phase != Phase::Idle {
            debug!("Generate ignored while {:?}", self.phase);
            return Command::None;
        }

        self.generation += 1;
        if self.selected_asset.is_none() {
            self.outcome = Some(Outcome::Failed(MockError::NoAssetSelected));
            return Command::None;
        }

        let duration = loading_duration(&mut self.rng);
        self.outcome = None;
        self.phase = Phase::Loading(Loading {
            duration,
            elapsed: Duration::ZERO,
            message_index: 0,
        });
        Command::BeginLoading(duration)
    }

    fn finish_loading(&mut self, now: DateTime<Local>) -> Command {
        // Stale deadline after a phase change.
        if !matches!(self.phase, Phase::Loading(_)) {
            return Command::None;
        }

        let outcome = if self.rng.gen_bool(SUCCESS_PROBABILITY) {
            let asset = self.selected_asset.clone().unwrap_or_default();
            Outcome::Signal(build_signal(&mut self.rng, &asset, now))
        } else {
            Outcome::Failed(MockError::AnalysisFailed)
        };
        self.outcome = Some(outcome);
        self.phase = Phase::Cooldown {
            remaining: COOLDOWN_SECS,
        };
        Command::BeginCooldown
    }

    fn tick_cooldown(&mut self) -> Command {
        let Phase::Cooldown { remaining } = self.phase else {
            return Command::None;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.phase = Phase::Idle;
            Command::EndCooldown
        } else {
            self.phase = Phase::Cooldown { remaining };
            Command::None
        }
    }
}
