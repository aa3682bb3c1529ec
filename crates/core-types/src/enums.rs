use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The side of a trade recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Returns the opposite direction
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

/// The market class a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Forex,
    Crypto,
    Indices,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Forex => "FOREX",
            Market::Crypto => "CRYPTO",
            Market::Indices => "INDICES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Active,
    Closed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "ACTIVE",
            SignalStatus::Closed => "CLOSED",
        }
    }
}

/// How a closed signal was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalResult {
    Win,
    Loss,
    BreakEven,
    Expired,
}

impl SignalResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalResult::Win => "WIN",
            SignalResult::Loss => "LOSS",
            SignalResult::BreakEven => "BREAK_EVEN",
            SignalResult::Expired => "EXPIRED",
        }
    }
}

/// Named risk appetites, each implying a minimum reward/risk ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskProfile {
    /// The minimum reward/risk ratio a candidate must reach under this profile.
    pub fn min_rr(&self) -> f64 {
        match self {
            RiskProfile::Conservative => 2.0,
            RiskProfile::Balanced => 1.5,
            RiskProfile::Aggressive => 1.2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Balanced => "balanced",
            RiskProfile::Aggressive => "aggressive",
        }
    }
}

// `FromStr` impls are used when reading rows back from the database and when
// parsing operator input on the command line.

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            other => Err(CoreError::InvalidInput("direction".to_string(), other.to_string())),
        }
    }
}

impl FromStr for Market {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FOREX" => Ok(Market::Forex),
            "CRYPTO" => Ok(Market::Crypto),
            "INDICES" => Ok(Market::Indices),
            other => Err(CoreError::InvalidInput("market".to_string(), other.to_string())),
        }
    }
}

impl FromStr for SignalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SignalStatus::Active),
            "CLOSED" => Ok(SignalStatus::Closed),
            other => Err(CoreError::InvalidInput("status".to_string(), other.to_string())),
        }
    }
}

impl FromStr for SignalResult {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "WIN" => Ok(SignalResult::Win),
            "LOSS" => Ok(SignalResult::Loss),
            "BREAK_EVEN" => Ok(SignalResult::BreakEven),
            "EXPIRED" => Ok(SignalResult::Expired),
            other => Err(CoreError::InvalidInput("result".to_string(), other.to_string())),
        }
    }
}

impl FromStr for RiskProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskProfile::Conservative),
            "balanced" => Ok(RiskProfile::Balanced),
            "aggressive" => Ok(RiskProfile::Aggressive),
            other => Err(CoreError::InvalidInput("risk profile".to_string(), other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SignalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
