//! # Tradewind Strategy Library
//!
//! This crate contains the pattern-detection logic of the Tradewind scanner. It
//! defines a universal `Strategy` trait, the structural primitives the
//! strategies are built from, and several concrete implementations.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No databases, no HTTP, no clocks. Strategies read candle
//!   slices and return at most one `StrategyCandidate`. Not having enough data
//!   is `Ok(None)`, never an error.
//! - **Strategy Agnostic Engine:** The engine's selector runs any list of
//!   `Box<dyn Strategy>` without knowing their internals.
//! - **Extensibility:** Adding a strategy means a new module implementing
//!   `Strategy`, a `StrategyId` variant, and a `factory` arm.
//!
//! ## Public API
//!
//! - `Strategy` and `StrategyContext`: The trait and its per-call inputs.
//! - `StrategyId`: Identifies a strategy implementation.
//! - `create_strategy`, `forex_indices_strategies`, `crypto_strategies`: Factories.
//! - `analysis` and `zones`: The reusable structural primitives.

pub mod analysis;
pub mod breakout;
pub mod error;
pub mod factory;
pub mod key_level_engulfing;
pub mod range_band;
pub mod zone_rejection;
pub mod zones;

pub use breakout::Breakout;
pub use error::StrategyError;
pub use factory::{create_strategy, crypto_strategies, forex_indices_strategies};
pub use key_level_engulfing::{KeyLevelEngulfing, Storyline};
pub use range_band::RangeBand;
pub use zone_rejection::ZoneRejection;
pub use zones::{detect_zones, is_in_zone, rejection_at, SupplyDemandZone, ZoneKind};

use core_types::{Candle, StrategyCandidate};
use std::fmt;
use std::str::FromStr;

/// Identifies a strategy implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    ZoneRejection,
    KeyLevelEngulfing,
    Breakout,
    RangeBand,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::ZoneRejection => "zone_rejection",
            StrategyId::KeyLevelEngulfing => "key_level_engulfing",
            StrategyId::Breakout => "breakout",
            StrategyId::RangeBand => "range_band",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zone_rejection" => Ok(StrategyId::ZoneRejection),
            "key_level_engulfing" | "mnsr" => Ok(StrategyId::KeyLevelEngulfing),
            "breakout" => Ok(StrategyId::Breakout),
            "range_band" => Ok(StrategyId::RangeBand),
            other => Err(StrategyError::StrategyNotFound(other.to_string())),
        }
    }
}

/// Everything a strategy may look at besides the working-timeframe candles.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub symbol: &'a str,
    /// Higher-timeframe candles, empty when they could not be fetched.
    pub higher_timeframe: &'a [Candle],
}

impl<'a> StrategyContext<'a> {
    pub fn new(symbol: &'a str, higher_timeframe: &'a [Candle]) -> Self {
        Self {
            symbol,
            higher_timeframe,
        }
    }
}

/// The core trait that all strategies implement.
///
/// Strategies are stateless between calls: every call receives the full
/// candle history it needs. The `Send + Sync` bounds let the engine share
/// them across tasks.
pub trait Strategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Analyzes the working-timeframe `candles` (oldest first).
    ///
    /// # Returns
    ///
    /// * `Ok(Some(candidate))` - if the strategy's conditions are met.
    /// * `Ok(None)` - if they are not, including when there is too little data.
    /// * `Err(StrategyError)` - if the analysis itself failed.
    fn analyze(
        &self,
        candles: &[Candle],
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyCandidate>, StrategyError>;
}
