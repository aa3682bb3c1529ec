use crate::enums::{Direction, Market, RiskProfile, SignalResult, SignalStatus};
use crate::error::CoreError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single OHLCV bar. `time` is the open time in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// The open time as a UTC timestamp, if it is representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.time).single()
    }
}

/// One or more take-profit targets.
///
/// Win/loss resolution only looks at the first level, while risk evaluation
/// considers every level and keeps the best reward/risk ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawTakeProfit")]
pub enum TakeProfit {
    Single(f64),
    Ladder(Vec<f64>),
}

// Untagged mirror used only to reject empty ladders during deserialization.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTakeProfit {
    Single(f64),
    Ladder(Vec<f64>),
}

impl TryFrom<RawTakeProfit> for TakeProfit {
    type Error = CoreError;

    fn try_from(raw: RawTakeProfit) -> Result<Self, Self::Error> {
        match raw {
            RawTakeProfit::Single(price) => Ok(TakeProfit::Single(price)),
            RawTakeProfit::Ladder(levels) => TakeProfit::ladder(levels),
        }
    }
}

impl TakeProfit {
    /// Builds a multi-level target. An empty list is rejected.
    pub fn ladder(levels: Vec<f64>) -> Result<Self, CoreError> {
        if levels.is_empty() {
            return Err(CoreError::InvalidTakeProfit(
                "a take-profit ladder needs at least one level".to_string(),
            ));
        }
        Ok(TakeProfit::Ladder(levels))
    }

    /// The level used to decide whether a signal has won.
    pub fn first(&self) -> f64 {
        match self {
            TakeProfit::Single(price) => *price,
            TakeProfit::Ladder(levels) => levels.first().copied().unwrap_or(f64::NAN),
        }
    }

    pub fn levels(&self) -> &[f64] {
        match self {
            TakeProfit::Single(price) => std::slice::from_ref(price),
            TakeProfit::Ladder(levels) => levels,
        }
    }
}

impl std::fmt::Display for TakeProfit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.levels().iter().map(|p| format!("{p:.5}")).collect();
        f.write_str(&rendered.join(" / "))
    }
}

/// A trade idea produced by a single strategy for a single scan. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCandidate {
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: TakeProfit,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
}

impl StrategyCandidate {
    /// Builds a candidate whose single target sits `reward_ratio` risk-units
    /// away from the entry, on the profitable side.
    pub fn with_reward_ratio(
        direction: Direction,
        entry: f64,
        stop_loss: f64,
        reward_ratio: f64,
        confidence: f64,
        reason: String,
    ) -> Self {
        let risk = (entry - stop_loss).abs();
        let take_profit = match direction {
            Direction::Buy => entry + risk * reward_ratio,
            Direction::Sell => entry - risk * reward_ratio,
        };
        Self {
            direction,
            entry,
            stop_loss,
            take_profit: TakeProfit::Single(take_profit),
            confidence: confidence.clamp(0.0, 1.0),
            reason,
        }
    }
}

/// A persisted trade recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub market: Market,
    pub symbol: String,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: TakeProfit,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SignalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SignalResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Signal {
    /// Creates a fresh, active signal from an approved candidate.
    pub fn from_candidate(
        candidate: &StrategyCandidate,
        market: Market,
        symbol: &str,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            direction: candidate.direction,
            market,
            symbol: symbol.to_string(),
            entry: candidate.entry,
            stop_loss: candidate.stop_loss,
            take_profit: candidate.take_profit.clone(),
            created_at,
            expires_at: created_at + ttl,
            status: SignalStatus::Active,
            result: None,
            closed_at: None,
            confidence: Some(candidate.confidence),
            reason: Some(candidate.reason.clone()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SignalStatus::Active
    }

    /// Moves the signal to `Closed`. Returns `false` (and changes nothing) if it
    /// was already closed; `Closed` is terminal.
    pub fn close(&mut self, result: SignalResult, closed_at: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = SignalStatus::Closed;
        self.result = Some(result);
        self.closed_at = Some(closed_at);
        true
    }
}

/// Scheduling record for the scan orchestrator. There is exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub next_scan_at: DateTime<Utc>,
    #[serde(default)]
    pub last_generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_id: Option<String>,
}

impl Default for ScanState {
    /// A never-scanned state is immediately due.
    fn default() -> Self {
        Self {
            next_scan_at: DateTime::<Utc>::default(),
            last_generated_at: None,
            last_id: None,
        }
    }
}

/// The risk policy applied to one scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub min_rr: f64,
    pub daily_limit: u32,
    pub risk_profile: RiskProfile,
}

impl RiskConfig {
    /// A config whose minimum ratio comes straight from the profile.
    pub fn from_profile(risk_profile: RiskProfile, daily_limit: u32) -> Self {
        Self {
            min_rr: risk_profile.min_rr(),
            daily_limit,
            risk_profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_buy() -> Signal {
        let candidate = StrategyCandidate {
            direction: Direction::Buy,
            entry: 1.1,
            stop_loss: 1.0,
            take_profit: TakeProfit::Single(1.2),
            confidence: 0.7,
            reason: "test".to_string(),
        };
        Signal::from_candidate(&candidate, Market::Forex, "EURUSD", Utc::now(), Duration::hours(24))
    }

    #[test]
    fn close_is_one_way() {
        let mut signal = active_buy();
        let first_close = Utc::now();
        assert!(signal.close(SignalResult::Win, first_close));
        assert!(!signal.close(SignalResult::Loss, Utc::now()));
        assert_eq!(signal.result, Some(SignalResult::Win));
        assert_eq!(signal.closed_at, Some(first_close));
        assert_eq!(signal.take_profit, TakeProfit::Single(1.2));
    }

    #[test]
    fn empty_ladder_is_rejected() {
        assert!(TakeProfit::ladder(vec![]).is_err());
        assert!(serde_json::from_str::<TakeProfit>("[]").is_err());
    }

    #[test]
    fn take_profit_reads_number_or_list() {
        let single: TakeProfit = serde_json::from_str("1.25").unwrap();
        assert_eq!(single.first(), 1.25);
        let ladder: TakeProfit = serde_json::from_str("[1.25, 1.3]").unwrap();
        assert_eq!(ladder.first(), 1.25);
        assert_eq!(ladder.levels().len(), 2);
    }

    #[test]
    fn reward_ratio_places_target_on_profitable_side() {
        let buy = StrategyCandidate::with_reward_ratio(Direction::Buy, 10.0, 9.0, 2.0, 0.6, String::new());
        assert_eq!(buy.take_profit.first(), 12.0);
        let sell = StrategyCandidate::with_reward_ratio(Direction::Sell, 10.0, 11.0, 3.0, 0.6, String::new());
        assert_eq!(sell.take_profit.first(), 7.0);
    }
}
