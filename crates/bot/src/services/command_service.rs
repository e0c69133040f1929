use std::{sync::Arc, time::Duration};

use chrono::Local;
use common::models::MockSignal;
use mock_flow::{
    Countdown, CountdownPhase, Outcome, Phase, SessionMsg, Snapshot, generator::classic_signal,
};
use signal_ai::{PairFilter, SignalError};
use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler},
    prelude::*,
    types::MessageId,
    utils::command::BotCommands,
};
use tokio::{sync::watch, time};
use tracing::{debug, info, warn};

use crate::{render, state::BotState};

/// How often a running presenter edits its message.
pub const EDIT_PERIOD: Duration = Duration::from_secs(1);

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Comandos disponíveis:")]
pub enum Command {
    #[command(description = "reinicia a sessão e mostra a ajuda")]
    Start,
    #[command(description = "mostra a ajuda")]
    Ajuda,
    #[command(description = "lista os ativos")]
    Ativos,
    #[command(description = "seleciona o ativo")]
    Ativo(String),
    #[command(description = "analisa o ativo selecionado")]
    Sinal,
    #[command(description = "sinal instantâneo em ativo aleatório")]
    Rapido,
    #[command(description = "sinal de IA para um par")]
    Cripto(String),
    #[command(description = "filtra o histórico por par")]
    Filtro(String),
    #[command(description = "últimos sinais de IA")]
    Historico,
    #[command(description = "usuários online")]
    Usuarios,
}

pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(answer)
}

/// Polls Telegram until ctrl-c.
pub async fn run(bot: Bot, state: Arc<BotState>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    info!("Starting Telegram command dispatcher");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn answer(bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let chat = msg.chat.id;
    debug!("Chat {} sent {:?}", chat.0, cmd);

    match cmd {
        Command::Start => {
            state.end_session(chat.0).await;
            bot.send_message(chat, render::HELP).await?;
        }
        Command::Ajuda => {
            bot.send_message(chat, render::HELP).await?;
        }
        Command::Ativos => {
            let selected = state.session(chat.0).await.snapshot().selected_asset;
            bot.send_message(chat, render::assets_text(&state.assets, selected.as_deref()))
                .await?;
        }
        Command::Ativo(raw) => select_asset(&bot, chat, &state, &raw).await?,
        Command::Sinal => generate_mock(&bot, chat, &state).await?,
        Command::Rapido => {
            let signal = {
                let mut rng = rand::thread_rng();
                classic_signal(&mut rng, &state.assets, Local::now())
            };
            let text = match signal {
                Some(signal) => render::mock_card(&signal, Local::now()),
                None => "Nenhum ativo configurado.".to_string(),
            };
            bot.send_message(chat, text).await?;
        }
        Command::Cripto(pair) => request_ai(&bot, chat, &state, &pair).await?,
        Command::Filtro(raw) => {
            let Some(desk) = &state.desk else {
                bot.send_message(chat, AI_DISABLED).await?;
                return Ok(());
            };
            let filter = PairFilter::parse(&raw);
            desk.set_filter(filter.clone()).await;
            let pairs = desk.feed().await.pairs();
            let known = if pairs.is_empty() {
                "nenhum ainda".to_string()
            } else {
                pairs.join(", ")
            };
            bot.send_message(chat, format!("Filtro: {}\nPares: {}", filter, known))
                .await?;
        }
        Command::Historico => {
            let Some(desk) = &state.desk else {
                bot.send_message(chat, AI_DISABLED).await?;
                return Ok(());
            };
            let feed = desk.feed().await;
            bot.send_message(chat, render::history_text(&feed)).await?;
        }
        Command::Usuarios => {
            let counters = *state.crowd.borrow();
            bot.send_message(chat, render::crowd_text(&counters)).await?;
        }
    }

    Ok(())
}

const AI_DISABLED: &str = "Sinais de IA desativados: defina GEMINI_API_KEY.";

async fn select_asset(bot: &Bot, chat: ChatId, state: &BotState, raw: &str) -> ResponseResult<()> {
    let Some(asset) = state.resolve_asset(raw) else {
        bot.send_message(chat, "Ativo inválido. Use /ativos para ver a lista.")
            .await?;
        return Ok(());
    };

    let session = state.session(chat.0).await;
    if let Err(e) = session.send(SessionMsg::SelectAsset(asset.to_string())).await {
        warn!("Chat {}: {}", chat.0, e);
    }
    bot.send_message(chat, format!("Ativo selecionado: {}", asset))
        .await?;
    Ok(())
}

async fn generate_mock(bot: &Bot, chat: ChatId, state: &BotState) -> ResponseResult<()> {
    let session = state.session(chat.0).await;
    let rx = session.subscribe();
    let snapshot = match session.generate().await {
        Ok(Some(snapshot)) => snapshot,
        // Ignored: cooling down, or another /sinal in this chat won the race.
        Ok(None) => {
            let text = match session.snapshot().phase {
                Phase::Cooldown { remaining } => render::cooldown_text(remaining),
                _ => "Análise em andamento...".to_string(),
            };
            bot.send_message(chat, text).await?;
            return Ok(());
        }
        Err(e) => {
            warn!("Chat {}: {}", chat.0, e);
            return Ok(());
        }
    };

    if !matches!(snapshot.phase, Phase::Loading(_)) {
        if let Some(Outcome::Failed(e)) = &snapshot.outcome {
            bot.send_message(chat, format!("⚠️ {}", e)).await?;
        }
        return Ok(());
    }

    let text = render::loading_text(&snapshot);
    let loading = bot.send_message(chat, text.as_str()).await?;
    tokio::spawn(present(bot.clone(), chat, loading.id, text, rx, snapshot.generation));
    Ok(())
}

/// Keeps one message in sync with a single generation of the chat's session:
/// loading status, then the card or error, then the countdown. Stops as soon
/// as a newer generation starts or the session goes away.
async fn present(
    bot: Bot,
    chat: ChatId,
    message_id: MessageId,
    mut shown: String,
    mut rx: watch::Receiver<Snapshot>,
    generation: u64,
) {
    let signal = loop {
        time::sleep(EDIT_PERIOD).await;
        if rx.has_changed().is_err() {
            return;
        }
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.generation != generation {
            return;
        }

        if let Phase::Loading(_) = snapshot.phase {
            let text = render::loading_text(&snapshot);
            edit(&bot, chat, message_id, &mut shown, text).await;
            continue;
        }

        match snapshot.outcome {
            Some(Outcome::Signal(signal)) => break signal,
            Some(Outcome::Failed(e)) => {
                edit(&bot, chat, message_id, &mut shown, format!("⚠️ {}", e)).await;
                return;
            }
            None => return,
        }
    };

    follow_countdown(&bot, chat, message_id, &mut shown, &signal, rx, generation).await;
}

async fn follow_countdown(
    bot: &Bot,
    chat: ChatId,
    message_id: MessageId,
    shown: &mut String,
    signal: &MockSignal,
    rx: watch::Receiver<Snapshot>,
    generation: u64,
) {
    edit(bot, chat, message_id, shown, render::mock_card(signal, Local::now())).await;

    let Some(countdown) = Countdown::for_signal(signal) else {
        return;
    };

    let mut ticker = time::interval(EDIT_PERIOD);
    loop {
        ticker.tick().await;
        if rx.has_changed().is_err() || rx.borrow().generation != generation {
            return;
        }

        let now = Local::now();
        edit(bot, chat, message_id, shown, render::mock_card(signal, now)).await;
        if countdown.phase(now) == CountdownPhase::Finished {
            return;
        }
    }
}

/// Edits only when the text actually changed.
async fn edit(bot: &Bot, chat: ChatId, message_id: MessageId, shown: &mut String, text: String) {
    if *shown == text {
        return;
    }
    match bot.edit_message_text(chat, message_id, text.as_str()).await {
        Ok(_) => *shown = text,
        Err(e) => warn!("Failed to edit message in chat {}: {}", chat.0, e),
    }
}

async fn request_ai(bot: &Bot, chat: ChatId, state: &BotState, pair: &str) -> ResponseResult<()> {
    let Some(desk) = &state.desk else {
        bot.send_message(chat, AI_DISABLED).await?;
        return Ok(());
    };

    let pair = pair.trim();
    if pair.is_empty() {
        bot.send_message(chat, "Informe um par, por exemplo: /cripto BTC/USD")
            .await?;
        return Ok(());
    }

    let pending = bot
        .send_message(chat, format!("Gerando sinal para {}...", pair))
        .await?;
    let text = match desk.request(pair).await {
        Ok(signal) => render::ai_card(&signal),
        Err(SignalError::InFlight(pair)) => {
            format!("Já existe uma análise em andamento para {}.", pair)
        }
        Err(e) => render::failure_text(pair, &e.to_string()),
    };
    bot.edit_message_text(chat, pending.id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_arguments() {
        assert_eq!(
            Command::parse("/ativo EUR/USD", "signal_bot").ok(),
            Some(Command::Ativo("EUR/USD".to_string()))
        );
        assert_eq!(
            Command::parse("/cripto BTC/USD", "signal_bot").ok(),
            Some(Command::Cripto("BTC/USD".to_string()))
        );
        assert_eq!(
            Command::parse("/filtro All", "signal_bot").ok(),
            Some(Command::Filtro("All".to_string()))
        );
        assert_eq!(
            Command::parse("/sinal", "signal_bot").ok(),
            Some(Command::Sinal)
        );
        assert!(Command::parse("/desconhecido", "signal_bot").is_err());
    }

    #[test]
    fn every_command_is_described() {
        let help = Command::descriptions().to_string();
        for name in ["/start", "/ativos", "/sinal", "/rapido", "/cripto", "/usuarios"] {
            assert!(help.contains(name), "{} missing from help", name);
        }
    }
}
