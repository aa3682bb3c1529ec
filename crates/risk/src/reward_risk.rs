use crate::error::RiskError;
use crate::RiskManager;
use core_types::{Direction, RiskConfig, StrategyCandidate};

/// Reward divided by risk for one take-profit level.
///
/// Returns `0.0` when the stop or the target sits on the wrong side of the
/// entry, or when any input is not finite. The ratio only depends on price
/// distances, so scaling all inputs by the same positive factor leaves it
/// unchanged.
pub fn reward_risk(direction: Direction, entry: f64, stop_loss: f64, take_profit: f64) -> f64 {
    if !(entry.is_finite() && stop_loss.is_finite() && take_profit.is_finite()) {
        return 0.0;
    }
    let (risk, reward) = match direction {
        Direction::Buy => (entry - stop_loss, take_profit - entry),
        Direction::Sell => (stop_loss - entry, entry - take_profit),
    };
    if risk <= 0.0 || reward <= 0.0 {
        return 0.0;
    }
    reward / risk
}

/// Accepts a candidate when its best take-profit level reaches a minimum
/// reward/risk ratio.
///
/// A ladder is judged as a whole: if any single level has a ratio of zero or
/// less (target or stop on the wrong side of the entry), the candidate is
/// rejected as a bad placement even when another level would clear the
/// minimum.
#[derive(Debug, Clone, Copy)]
pub struct RiskEvaluator {
    min_rr: f64,
}

impl RiskEvaluator {
    /// Creates a new `RiskEvaluator` enforcing `min_rr`.
    pub fn new(min_rr: f64) -> Result<Self, RiskError> {
        if !min_rr.is_finite() || min_rr <= 0.0 {
            return Err(RiskError::InvalidParameters(format!(
                "min_rr must be a positive number, got {min_rr}"
            )));
        }
        Ok(Self { min_rr })
    }

    pub fn from_config(config: &RiskConfig) -> Result<Self, RiskError> {
        Self::new(config.min_rr)
    }

    pub fn min_rr(&self) -> f64 {
        self.min_rr
    }
}

impl RiskManager for RiskEvaluator {
    fn evaluate(&self, candidate: &StrategyCandidate) -> Result<f64, RiskError> {
        // --- 1. Every level must make sense on its own ---
        let ratios: Vec<f64> = candidate
            .take_profit
            .levels()
            .iter()
            .map(|&tp| reward_risk(candidate.direction, candidate.entry, candidate.stop_loss, tp))
            .collect();

        if ratios.is_empty() || ratios.iter().any(|&rr| rr <= 0.0) {
            return Err(RiskError::InvalidPlacement(format!(
                "{} entry {} stop {} target {}",
                candidate.direction, candidate.entry, candidate.stop_loss, candidate.take_profit
            )));
        }

        // --- 2. The best level decides ---
        let best = ratios.iter().copied().fold(f64::MIN, f64::max);
        if best < self.min_rr {
            tracing::debug!(best, min = self.min_rr, "Candidate below minimum reward/risk.");
            return Err(RiskError::Rejected {
                best,
                min: self.min_rr,
            });
        }

        Ok(best)
    }
}
