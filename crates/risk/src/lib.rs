//! # Tradewind Risk Gate
//!
//! Decides whether a strategy candidate offers enough reward for the risk it
//! takes before it is allowed to become a signal.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No I/O. Depends only on `core-types`.
//! - **Unit Independence:** Only price distances are compared, so the same
//!   threshold works for FX pips, index points and crypto dollars.
//!
//! ## Public API
//!
//! - `RiskManager`: The trait the engine calls for every candidate.
//! - `RiskEvaluator`: Accepts candidates reaching a minimum reward/risk.
//! - `reward_risk`: The raw ratio for a single take-profit level.

pub mod error;
pub mod reward_risk;

pub use error::RiskError;
pub use reward_risk::{reward_risk, RiskEvaluator};

use core_types::StrategyCandidate;

/// The contract for any component that gates candidates on risk.
pub trait RiskManager: Send + Sync {
    /// Returns the best reward/risk ratio across the candidate's take-profit
    /// levels when the candidate is acceptable.
    fn evaluate(&self, candidate: &StrategyCandidate) -> Result<f64, RiskError>;
}
