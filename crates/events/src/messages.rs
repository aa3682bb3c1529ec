use chrono::{DateTime, Utc};
use core_types::{Direction, Signal, SignalResult};
use serde::{Deserialize, Serialize};

/// Enum representing the severity of a log message for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A structured log message for listeners that want engine diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// How and when an active signal was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalClosure {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub result: SignalResult,
    /// The market price that triggered the resolution, if any.
    pub price: Option<f64>,
    pub closed_at: DateTime<Utc>,
}

/// The top-level event enum broadcast by the engine.
///
/// Serialized adjacently tagged, e.g.
/// `{ "type": "SignalClosed", "payload": { "id": "...", "result": "WIN", ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// A new signal was persisted.
    SignalCreated(Signal),
    /// An active signal hit its stop, its target, or its expiry.
    SignalClosed(SignalClosure),
    /// A structured log message.
    Log(LogMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_adjacently_tagged() {
        let event = EngineEvent::SignalClosed(SignalClosure {
            id: "abc".to_string(),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            result: SignalResult::Win,
            price: Some(1.21),
            closed_at: DateTime::<Utc>::default(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SignalClosed");
        assert_eq!(json["payload"]["result"], "WIN");
        assert_eq!(json["payload"]["direction"], "BUY");
        assert_eq!(json["payload"]["closedAt"], "1970-01-01T00:00:00Z");
    }
}
