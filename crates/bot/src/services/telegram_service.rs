use signal_ai::FeedEvent;
use teloxide::prelude::*;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::render;

/// Pushes every AI feed event to one configured chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub async fn start(self, mut rx: broadcast::Receiver<FeedEvent>) {
        info!("Starting Telegram Notification Service for chat {}", self.chat_id.0);

        loop {
            match rx.recv().await {
                Ok(event) => {
                    // Send message and log error if it fails, but don't crash
                    if let Err(e) = self.bot.send_message(self.chat_id, render_event(&event)).await {
                        error!("Failed to send Telegram message: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("Telegram service lagged behind. Missed {} messages.", n);
                }
                Err(_) => {
                    info!("Telegram notification channel closed. Stopping service.");
                    break;
                }
            }
        }
    }
}

pub fn render_event(event: &FeedEvent) -> String {
    match event {
        FeedEvent::Signal(signal) => render::ai_card(signal),
        FeedEvent::Failure { pair, message } => render::failure_text(pair, message),
    }
}
