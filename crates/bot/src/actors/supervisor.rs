use std::{collections::HashMap, time::Duration};
use tracing::{debug, error, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::actors::{Actor, ActorType, ControlMessage};

pub const CHECK_PERIOD: Duration = Duration::from_secs(1);
pub const SILENCE_TIMEOUT: Duration = Duration::from_secs(3);

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Spawns every registered actor and restarts any that go quiet for
    /// longer than `SILENCE_TIMEOUT`. Never returns.
    pub async fn start(&mut self) {
        let mut check_interval = time::interval(CHECK_PERIOD);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type) => {
                            if self.handles.contains_key(&actor_type) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(actor_type) => {
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            self.pulses.remove(&actor_type);
                            if let Some(handle) = self.handles.remove(&actor_type) {
                                handle.abort();
                            }
                        },
                        ControlMessage::Error(actor_type, error_msg) => {
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                        },
                    }
                }

                _ = check_interval.tick() => {
                    let now = Instant::now();

                    let dead_actors: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|(_, last)| now.duration_since(**last) > SILENCE_TIMEOUT)
                        .map(|(actor, _)| *actor)
                        .collect();

                    for actor in dead_actors {
                        warn!("{:?} is unresponsive, restarting", actor);
                        if let Some(handle) = self.handles.remove(&actor) {
                            handle.abort();
                        }
                        self.spawn_actor(actor, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            error!("No factory registered for {:?}", actor_type);
            return;
        };

        let mut new_actor = factory();
        debug!("Spawning {:?} ({})", actor_type, new_actor.id());
        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", actor_type, e);
            }
        });
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use uuid::Uuid;

    struct Mute;

    #[async_trait]
    impl Actor for Mute {
        fn name(&self) -> ActorType {
            ActorType::CrowdActor
        }

        fn id(&self) -> Uuid {
            Uuid::nil()
        }

        async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Chatty;

    #[async_trait]
    impl Actor for Chatty {
        fn name(&self) -> ActorType {
            ActorType::SignalRefreshActor
        }

        fn id(&self) -> Uuid {
            Uuid::nil()
        }

        async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            let _heartbeat = self.spawn_heartbeat(supervisor_tx);
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Beats for a while, then panics.
    struct Doomed;

    #[async_trait]
    impl Actor for Doomed {
        fn name(&self) -> ActorType {
            ActorType::CrowdActor
        }

        fn id(&self) -> Uuid {
            Uuid::nil()
        }

        async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            let _heartbeat = self.spawn_heartbeat(supervisor_tx);
            time::sleep(Duration::from_secs(2)).await;
            panic!("doomed actor crashed");
        }
    }

    fn counting<A: Actor + 'static>(
        spawned: Arc<AtomicUsize>,
        make: fn() -> A,
    ) -> ActorFactory {
        Box::new(move || {
            spawned.fetch_add(1, Ordering::SeqCst);
            Box::new(make())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn silent_actor_is_restarted_and_healthy_one_is_not() {
        let mute_spawns = Arc::new(AtomicUsize::new(0));
        let chatty_spawns = Arc::new(AtomicUsize::new(0));

        let mut supervisor = Supervisor::new();
        supervisor.register_actor(
            ActorType::CrowdActor,
            counting(mute_spawns.clone(), || Mute),
        );
        supervisor.register_actor(
            ActorType::SignalRefreshActor,
            counting(chatty_spawns.clone(), || Chatty),
        );

        let handle = tokio::spawn(async move { supervisor.start().await });
        time::sleep(Duration::from_secs(10)).await;

        assert!(mute_spawns.load(Ordering::SeqCst) >= 2);
        assert_eq!(chatty_spawns.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn panicked_actor_is_restarted() {
        let spawns = Arc::new(AtomicUsize::new(0));

        let mut supervisor = Supervisor::new();
        supervisor.register_actor(ActorType::CrowdActor, counting(spawns.clone(), || Doomed));

        let handle = tokio::spawn(async move { supervisor.start().await });
        time::sleep(Duration::from_secs(12)).await;

        assert!(spawns.load(Ordering::SeqCst) >= 2);

        handle.abort();
    }
}
