use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{
    sync::{mpsc, watch},
    time,
};
use tracing::{debug, info};
use uuid::Uuid;

pub const CROWD_TICK: Duration = Duration::from_secs(3);

const ACTIVE_SEED: RangeInclusive<u32> = 1200..=1800;
const ACTIVE_STEP: i32 = 15;
const WINNING_SEED: RangeInclusive<u32> = 350..=650;
const WINNING_STEP: i32 = 5;

/// Cosmetic "users online" numbers. They never feed into a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrowdCounters {
    pub active: u32,
    pub winning: u32,
}

impl CrowdCounters {
    pub fn seed<R: Rng>(rng: &mut R) -> Self {
        Self {
            active: rng.gen_range(ACTIVE_SEED),
            winning: rng.gen_range(WINNING_SEED),
        }
    }

    pub fn nudge<R: Rng>(&self, rng: &mut R) -> Self {
        Self {
            active: self
                .active
                .saturating_add_signed(rng.gen_range(-ACTIVE_STEP..=ACTIVE_STEP)),
            winning: self
                .winning
                .saturating_add_signed(rng.gen_range(-WINNING_STEP..=WINNING_STEP)),
        }
    }
}

pub struct CrowdService {
    id: Uuid,
    counters_tx: Arc<watch::Sender<CrowdCounters>>,
}

#[async_trait]
impl Actor for CrowdService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::CrowdActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting Crowd Service {}", self.id);

        let mut rng = StdRng::from_entropy();
        let mut counters = *self.counters_tx.borrow();
        if counters == CrowdCounters::default() {
            counters = CrowdCounters::seed(&mut rng);
            self.counters_tx.send_replace(counters);
        }

        let mut ticker = time::interval_at(time::Instant::now() + CROWD_TICK, CROWD_TICK);
        loop {
            ticker.tick().await;
            counters = counters.nudge(&mut rng);
            debug!("Crowd counters now {:?}", counters);

            if self.counters_tx.send(counters).is_err() {
                supervisor_tx.try_send(ControlMessage::Error(
                    self.name(),
                    "Crowd counters have no receivers left".to_string(),
                ))?;
                bail!("Crowd counters have no receivers left");
            }
        }
    }
}

impl CrowdService {
    pub fn new(counters_tx: Arc<watch::Sender<CrowdCounters>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            counters_tx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_within_ranges_and_never_goes_negative() {
        let mut rng = StdRng::seed_from_u64(11);
        let seeded = CrowdCounters::seed(&mut rng);
        assert!(ACTIVE_SEED.contains(&seeded.active));
        assert!(WINNING_SEED.contains(&seeded.winning));

        let mut counters = CrowdCounters {
            active: 3,
            winning: 1,
        };
        for _ in 0..1000 {
            let next = counters.nudge(&mut rng);
            assert!(next.active.abs_diff(counters.active) <= ACTIVE_STEP as u32);
            assert!(next.winning.abs_diff(counters.winning) <= WINNING_STEP as u32);
            counters = next;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_seed_then_moves_on_every_tick() {
        let (tx, mut rx) = watch::channel(CrowdCounters::default());
        let mut service = CrowdService::new(Arc::new(tx));
        let (supervisor_tx, _supervisor_rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { service.run(supervisor_tx).await });

        rx.changed().await.unwrap();
        let seeded = *rx.borrow_and_update();
        assert!(ACTIVE_SEED.contains(&seeded.active));

        time::sleep(CROWD_TICK * 3 + Duration::from_millis(10)).await;
        assert!(rx.has_changed().unwrap());

        handle.abort();
    }
}
