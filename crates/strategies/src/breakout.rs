use crate::analysis::{self, KeyLevel, LevelKind};
use crate::error::StrategyError;
use crate::{Strategy, StrategyContext, StrategyId};
use configuration::settings::BreakoutParams;
use core_types::{Candle, Direction, StrategyCandidate};

const ATR_PERIOD: usize = 14;

/// Strong-bodied closes through a nearby swing level.
pub struct Breakout {
    params: BreakoutParams,
}

impl Breakout {
    pub fn new(params: BreakoutParams) -> Result<Self, StrategyError> {
        if params.swing_window == 0 {
            return Err(StrategyError::InvalidParameters(
                "swing_window must be greater than zero".to_string(),
            ));
        }
        if params.reward_ratio <= 0.0 || params.max_distance <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "reward_ratio and max_distance must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// Swing levels of `candles`, ignoring the most recent candles that may be
    /// the ones breaking them.
    pub fn key_levels(&self, candles: &[Candle]) -> Vec<KeyLevel> {
        let swings =
            analysis::find_swings(candles, self.params.swing_window, self.params.exclude_recent);
        let levels = swings
            .highs
            .iter()
            .map(KeyLevel::resistance)
            .chain(swings.lows.iter().map(KeyLevel::support))
            .collect();
        analysis::merge_levels(levels, self.params.merge_tolerance)
    }
}

impl Strategy for Breakout {
    fn id(&self) -> StrategyId {
        StrategyId::Breakout
    }

    fn analyze(
        &self,
        candles: &[Candle],
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyCandidate>, StrategyError> {
        if candles.len() < self.params.min_candles.max(2) {
            return Ok(None);
        }
        let [.., prev, current] = candles else {
            return Ok(None);
        };

        let strong_body =
            analysis::body(current) > self.params.min_body_ratio * analysis::range(current);
        if !strong_body {
            return Ok(None);
        }

        let atr = analysis::latest_atr(candles, ATR_PERIOD);
        let mut best: Option<StrategyCandidate> = None;

        for level in self.key_levels(candles) {
            if (current.close - level.price).abs() / current.close >= self.params.max_distance {
                continue;
            }

            let broken = match level.kind {
                LevelKind::Resistance => {
                    current.close > level.price
                        && (prev.close <= level.price || current.open <= level.price)
                }
                LevelKind::Support => {
                    current.close < level.price
                        && (prev.close >= level.price || current.open >= level.price)
                }
            };
            if !broken {
                continue;
            }

            let (direction, stop_loss, label) = match level.kind {
                LevelKind::Resistance => (
                    Direction::Buy,
                    level.price - self.params.stop_atr_multiple * atr,
                    "resistance",
                ),
                LevelKind::Support => (
                    Direction::Sell,
                    level.price + self.params.stop_atr_multiple * atr,
                    "support",
                ),
            };
            let confidence = (0.6 + 0.1 * level.strength as f64).min(0.9);

            if best.as_ref().is_none_or(|b| confidence > b.confidence) {
                best = Some(StrategyCandidate::with_reward_ratio(
                    direction,
                    current.close,
                    stop_loss,
                    self.params.reward_ratio,
                    confidence,
                    format!(
                        "Breakout through {label} {:.5} (strength {})",
                        level.price, level.strength
                    ),
                ));
            }
        }

        if let Some(candidate) = &best {
            tracing::debug!(symbol = ctx.symbol, direction = %candidate.direction, "Breakout detected.");
        }
        Ok(best)
    }
}
