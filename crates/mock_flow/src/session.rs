use std::{future, time::Duration};

use anyhow::anyhow;
use chrono::Local;
use rand::Rng;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    generator::STATUS_PERIOD,
    machine::{Command, MockMachine, Msg, Snapshot},
};

pub const PROGRESS_PERIOD: Duration = Duration::from_millis(100);
const COOLDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum SessionMsg {
    SelectAsset(String),
    /// Answered with the snapshot of the new generation, or `None` when the
    /// request was ignored because a run is loading or cooling down.
    Generate(oneshot::Sender<Option<Snapshot>>),
}

/// Owns one mock session task. Dropping the handle aborts the task and every
/// timer it holds.
pub struct SessionHandle {
    tx: mpsc::Sender<SessionMsg>,
    snapshots: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn spawn<R>(machine: MockMachine<R>) -> Self
    where
        R: Rng + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let (snapshot_tx, snapshots) = watch::channel(machine.snapshot());
        let task = tokio::spawn(drive(machine, rx, snapshot_tx));
        Self {
            tx,
            snapshots,
            task,
        }
    }

    pub async fn send(&self, msg: SessionMsg) -> anyhow::Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|e| anyhow!("Mock session is gone: {}", e))
    }

    /// Starts a new generation. Only one of several concurrent callers gets
    /// `Some`; the others see the request ignored.
    pub async fn generate(&self) -> anyhow::Result<Option<Snapshot>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionMsg::Generate(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|e| anyhow!("Mock session dropped the request: {}", e))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
struct Timers {
    status: Option<Interval>,
    progress: Option<Interval>,
    cooldown: Option<Interval>,
    loading_started: Option<Instant>,
    loading_deadline: Option<Instant>,
}

impl Timers {
    fn apply(&mut self, command: Command) {
        match command {
            Command::None => {}
            Command::BeginLoading(duration) => {
                let now = Instant::now();
                self.status = Some(ticker(now + STATUS_PERIOD, STATUS_PERIOD));
                self.progress = Some(ticker(now + PROGRESS_PERIOD, PROGRESS_PERIOD));
                self.loading_started = Some(now);
                self.loading_deadline = Some(now + duration);
            }
            Command::BeginCooldown => {
                self.status = None;
                self.progress = None;
                self.loading_started = None;
                self.loading_deadline = None;
                self.cooldown = Some(ticker(Instant::now() + COOLDOWN_PERIOD, COOLDOWN_PERIOD));
            }
            Command::EndCooldown => self.cooldown = None,
        }
    }
}

fn ticker(start: Instant, period: Duration) -> Interval {
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn drive<R: Rng>(
    mut machine: MockMachine<R>,
    mut rx: mpsc::Receiver<SessionMsg>,
    snapshots: watch::Sender<Snapshot>,
) {
    let mut timers = Timers::default();

    loop {
        let started = timers.loading_started;
        let deadline = timers.loading_deadline;

        let (msg, reply) = tokio::select! {
            received = rx.recv() => match received {
                Some(SessionMsg::SelectAsset(asset)) => (Msg::SelectAsset(asset), None),
                Some(SessionMsg::Generate(reply)) => (Msg::Generate, Some(reply)),
                None => break,
            },
            _ = until(deadline) => (Msg::LoadingElapsed, None),
            _ = tick(&mut timers.status) => (Msg::StatusTick, None),
            at = tick(&mut timers.progress) => {
                (Msg::Progress(at.saturating_duration_since(started.unwrap_or(at))), None)
            }
            _ = tick(&mut timers.cooldown) => (Msg::CooldownTick, None),
        };

        let before = snapshots.borrow().generation;
        let command = machine.update(msg, Local::now());
        timers.apply(command);
        let snapshot = machine.snapshot();
        snapshots.send_replace(snapshot.clone());

        if let Some(reply) = reply {
            let accepted = snapshot.generation != before;
            // The caller may have given up waiting.
            let _ = reply.send(accepted.then_some(snapshot));
        }
    }

    debug!("Mock session closed");
}
