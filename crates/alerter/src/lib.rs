use crate::error::AlerterError;
use configuration::TelegramConfig;
use core_types::{Direction, Signal, SignalResult};
use events::{EngineEvent, LogLevel, SignalClosure};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;
pub mod error;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str, // To allow for formatting like bold, italics etc.
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the configuration,
    /// allowing the system to gracefully disable alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Sends a text message to the configured Telegram chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::ApiError(error_text));
        }

        Ok(())
    }
}

/// A long-running service that listens to the engine's broadcast channel and
/// forwards new signals, resolutions, and high-severity logs to Telegram.
///
/// Delivery failures are logged and never reach the engine.
pub async fn run_alerter_service(
    alerter: TelegramAlerter,
    mut event_rx: broadcast::Receiver<EngineEvent>,
) {
    tracing::info!("Alerter service started. Listening for engine events.");

    if let Err(e) = alerter.send_message("✅ *Tradewind scanner started*").await {
        tracing::warn!(error = %e, "Failed to send startup message.");
    }

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(msg) = format_event(&event) {
                    if let Err(e) = alerter.send_message(&msg).await {
                        tracing::error!(error = ?e, "Failed to send Telegram alert.");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Alerter service lagged, skipped {} messages.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Broadcast channel closed. Alerter service shutting down.");
                break;
            }
        }
    }
}

/// Renders an event as a MarkdownV2 message, or `None` if it is not worth a
/// notification.
pub fn format_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::SignalCreated(signal) => Some(format_new_signal(signal)),
        EngineEvent::SignalClosed(closure) => Some(format_closure(closure)),
        EngineEvent::Log(log) => match log.level {
            LogLevel::Error | LogLevel::Warn => {
                let title = if log.level == LogLevel::Error {
                    "🚨 ERROR"
                } else {
                    "⚠️ WARNING"
                };
                Some(format!("*{}*: {}", title, escape_markdown(&log.message)))
            }
            LogLevel::Info => None,
        },
    }
}

fn format_new_signal(signal: &Signal) -> String {
    let icon = match signal.direction {
        Direction::Buy => "📈",
        Direction::Sell => "📉",
    };
    let targets = signal
        .take_profit
        .levels()
        .iter()
        .map(|tp| escape_markdown(&format!("{tp:.5}")))
        .collect::<Vec<_>>()
        .join(", ");

    let mut text = format!(
        "{} *{} {}* \\({}\\)\nEntry: `{}`\nStop: `{}`\nTarget: `{}`",
        icon,
        signal.direction,
        escape_markdown(&signal.symbol),
        signal.market,
        escape_markdown(&format!("{:.5}", signal.entry)),
        escape_markdown(&format!("{:.5}", signal.stop_loss)),
        targets,
    );
    if let Some(confidence) = signal.confidence {
        text.push_str(&format!("\nConfidence: {}%", (confidence * 100.0).round()));
    }
    if let Some(reason) = &signal.reason {
        text.push_str(&format!("\n_{}_", escape_markdown(reason)));
    }
    text
}

fn format_closure(closure: &SignalClosure) -> String {
    let icon = match closure.result {
        SignalResult::Win => "✅",
        SignalResult::Loss => "❌",
        SignalResult::BreakEven => "➖",
        SignalResult::Expired => "⌛",
    };
    let mut text = format!(
        "{} *{} {}* closed: {}",
        icon,
        closure.direction,
        escape_markdown(&closure.symbol),
        escape_markdown(closure.result.as_str()),
    );
    if let Some(price) = closure.price {
        text.push_str(&format!(" at `{}`", escape_markdown(&format!("{price:.5}"))));
    }
    text
}

/// A helper function to escape characters that have special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    let special_chars = r"\_*[]()~`>#+-=|{}.!";
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special_chars.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{Market, StrategyCandidate};
    use events::LogMessage;

    fn signal() -> Signal {
        let candidate = StrategyCandidate::with_reward_ratio(
            Direction::Buy,
            1.1,
            1.09,
            2.0,
            0.7,
            "Rejection from demand zone".to_string(),
        );
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Signal::from_candidate(&candidate, Market::Forex, "EURUSD", now, chrono::Duration::hours(24))
    }

    #[test]
    fn escapes_every_special_character_once() {
        assert_eq!(escape_markdown("1.5-2"), "1\\.5\\-2");
        assert_eq!(escape_markdown("a_b"), "a\\_b");
    }

    #[test]
    fn new_signal_message_lists_levels() {
        let text = format_event(&EngineEvent::SignalCreated(signal())).unwrap();
        assert!(text.starts_with("📈 *BUY EURUSD*"));
        assert!(text.contains("Entry: `1\\.10000`"));
        assert!(text.contains("Stop: `1\\.09000`"));
        assert!(text.contains("Confidence: 70%"));
    }

    #[test]
    fn closure_message_names_result() {
        let closure = SignalClosure {
            id: "x".to_string(),
            symbol: "EURUSD".to_string(),
            direction: Direction::Sell,
            result: SignalResult::Loss,
            price: Some(1.2),
            closed_at: Utc::now(),
        };
        let text = format_event(&EngineEvent::SignalClosed(closure)).unwrap();
        assert_eq!(text, "❌ *SELL EURUSD* closed: LOSS at `1\\.20000`");
    }

    #[test]
    fn info_logs_are_not_forwarded() {
        let event = EngineEvent::Log(LogMessage::new(LogLevel::Info, "scan finished"));
        assert!(format_event(&event).is_none());
        let event = EngineEvent::Log(LogMessage::new(LogLevel::Error, "store down"));
        assert!(format_event(&event).unwrap().contains("store down"));
    }
}
