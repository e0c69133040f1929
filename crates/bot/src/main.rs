use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::{Bot, types::ChatId};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use common::actors::ActorType;
use common::config::AppConfig;
use common::logger;
use mock_flow::{CrowdCounters, CrowdService};
use signal_ai::remote::GeminiClient;
use signal_ai::services::SignalRefreshService;
use signal_ai::{FeedEvent, SignalDesk, SignalFlow};

use crate::actors::supervisor::Supervisor;
use crate::services::console_service::ConsoleService;
use crate::services::telegram_service::TelegramNotifier;
use crate::state::BotState;

mod actors;
mod render;
mod services;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    debug!("System starting up...");

    let config = AppConfig::from_env()?;

    let mut supervisor = Supervisor::new();
    let (events_tx, _) = broadcast::channel::<FeedEvent>(256);

    let desk = match &config.gemini {
        Some(gemini) => {
            info!("AI signals enabled with model {}", gemini.model);
            let client = GeminiClient::new(gemini)?;
            let desk = Arc::new(SignalDesk::new(
                SignalFlow::new(Arc::new(client)),
                events_tx.clone(),
            ));

            let desk_for_refresh = desk.clone();
            let pairs = config.pairs.clone();
            let interval = config.refresh_interval;
            supervisor.register_actor(
                ActorType::SignalRefreshActor,
                Box::new(move || {
                    Box::new(SignalRefreshService::new(
                        desk_for_refresh.clone(),
                        pairs.clone(),
                        interval,
                    ))
                }),
            );
            Some(desk)
        }
        None => {
            warn!("GEMINI_API_KEY not set, AI signals disabled");
            None
        }
    };

    let (crowd_tx, crowd_rx) = watch::channel(CrowdCounters::default());
    let crowd_tx = Arc::new(crowd_tx);
    supervisor.register_actor(
        ActorType::CrowdActor,
        Box::new(move || Box::new(CrowdService::new(crowd_tx.clone()))),
    );

    tokio::spawn(async move { supervisor.start().await });

    match config.telegram {
        Some(telegram) => {
            let bot = Bot::new(telegram.token);
            if let Some(chat_id) = telegram.chat_id {
                let notifier = TelegramNotifier::new(bot.clone(), ChatId(chat_id));
                tokio::spawn(notifier.start(events_tx.subscribe()));
            }

            let state = Arc::new(BotState::new(config.mock_assets, desk, crowd_rx));
            tokio::spawn(state::sweep_sessions(state.clone()));
            services::command_service::run(bot, state).await;
        }
        None => {
            info!("TELEGRAM_BOT_TOKEN not set, presenting signals on the console");
            let console = ConsoleService::new(crowd_rx);
            tokio::spawn(console.start(events_tx.subscribe()));
            tokio::signal::ctrl_c().await?;
        }
    }

    info!("Shutting down");
    Ok(())
}
