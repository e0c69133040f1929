use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use common::models::{Direction, MockSignal, SignalResult, mock_signal::clock};
use mock_flow::{Countdown, CrowdCounters, Snapshot};
use num_format::{Locale, ToFormattedString};
use signal_ai::SignalFeed;

const MONTHS_PT: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

const BAR_WIDTH: usize = 10;
const HISTORY_LIMIT: usize = 10;

pub const HELP: &str = "Comandos disponíveis:\n\
/ativos - lista os ativos\n\
/ativo <ativo> - seleciona o ativo\n\
/sinal - analisa o ativo selecionado\n\
/rapido - sinal instantâneo em ativo aleatório\n\
/cripto <par> - sinal de IA para um par (ex: BTC/USD)\n\
/filtro <par|All> - filtra o histórico\n\
/historico - últimos sinais de IA\n\
/usuarios - usuários online";

/// en-US currency with two to four fraction digits, e.g. `$64,123.4567`.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let fixed = format!("{:.4}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "0000"));
    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }

    let whole = int_part.parse::<u128>().unwrap_or(0);
    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!(
        "{}${}.{}",
        sign,
        whole.to_formatted_string(&Locale::en),
        frac
    )
}

/// `5 de março de 2025 às 14:03:09`
pub fn format_timestamp_pt<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    let month = MONTHS_PT[at.month0() as usize];
    format!(
        "{} de {} de {} às {:02}:{:02}:{:02}",
        at.day(),
        month,
        at.year(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

pub fn ai_card(signal: &SignalResult) -> String {
    let (arrow, side) = match signal.direction {
        Direction::Buy => ("🟢", "BUY"),
        Direction::Sell => ("🔴", "SELL"),
    };
    let timestamp = signal
        .generated_at()
        .map(|at| format_timestamp_pt(&at.with_timezone(&Local)))
        .unwrap_or_else(|| signal.timestamp.clone());

    let mut card = format!(
        "{} {} {}\n\
         Preço de Entrada: {}\n\
         Confiança: {:.0}%\n\
         Take Profit: {}\n\
         Stop Loss: {}\n",
        arrow,
        signal.pair,
        side,
        format_usd(signal.price),
        signal.confidence * 100.0,
        format_usd(signal.take_profit),
        format_usd(signal.stop_loss),
    );
    if let Some(minutes) = signal.duration_minutes {
        card.push_str(&format!("Duração: {} min\n", minutes));
    }
    card.push_str(&timestamp);
    card
}

pub fn mock_card(signal: &MockSignal, now: DateTime<Local>) -> String {
    let mut card = format!(
        "✅ ENTRADA CONFIRMADA\n\
         Ativo: {}\n\
         Entrada às: {}\n\
         Expiração: {}\n\
         Análise: {}\n\
         Proteção 1: {}\n",
        signal.asset,
        signal.entry_time(),
        signal.expiration,
        signal.analysis,
        signal.protection1(),
    );
    if let Some(protection2) = signal.protection2() {
        card.push_str(&format!("Proteção 2: {}\n", protection2));
    }
    if let Some(volatility) = signal.volatility {
        card.push_str(&format!("Volatilidade: {}\n", volatility));
    }
    if let Some(assertiveness) = signal.assertiveness {
        card.push_str(&format!("Assertividade: {}%\n", assertiveness));
    }
    if let Some(countdown) = Countdown::for_signal(signal) {
        card.push_str(&format!("⏱ {}\n", countdown.display(now)));
    }
    card.trim_end().to_string()
}

pub fn progress_bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH) / 100;
    format!(
        "[{}{}] {}%",
        "▓".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        percent.min(100)
    )
}

pub fn loading_text(snapshot: &Snapshot) -> String {
    let asset = snapshot.selected_asset.as_deref().unwrap_or("-");
    let status = snapshot.status_message().unwrap_or("Analisando...");
    let bar = progress_bar(snapshot.progress().unwrap_or(0));
    format!("🔎 {}\n{}\n{}", asset, status, bar)
}

pub fn cooldown_text(remaining: u32) -> String {
    format!("⏳ Aguarde {}s para gerar um novo sinal.", remaining)
}

pub fn failure_text(pair: &str, message: &str) -> String {
    format!("⚠️ {}: {}", pair, message)
}

pub fn crowd_text(counters: &CrowdCounters) -> String {
    format!(
        "👥 {} usuários online\n🏆 {} lucrando agora",
        counters.active, counters.winning
    )
}

pub fn assets_text(assets: &[String], selected: Option<&str>) -> String {
    let mut text = String::from("Ativos disponíveis:\n");
    for asset in assets {
        let marker = if Some(asset.as_str()) == selected { "▶" } else { "•" };
        text.push_str(&format!("{} {}\n", marker, asset));
    }
    text.trim_end().to_string()
}

pub fn history_text(feed: &SignalFeed) -> String {
    let visible = feed.visible();
    if visible.is_empty() {
        return format!("Nenhum sinal para {}.", feed.filter());
    }

    let mut text = format!("Últimos sinais ({}):\n", feed.filter());
    for signal in visible.into_iter().take(HISTORY_LIMIT) {
        let at = signal
            .generated_at()
            .map(|at| clock(&at.with_timezone(&Local)))
            .unwrap_or_default();
        text.push_str(&format!(
            "{} {} {} {} ({:.0}%)\n",
            at,
            signal.pair,
            signal.direction.as_str().to_uppercase(),
            format_usd(signal.price),
            signal.confidence * 100.0
        ));
    }
    text.trim_end().to_string()
}
