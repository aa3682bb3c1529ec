use crate::analysis::{self, KeyLevel, LevelKind, SwingPoint};
use crate::error::StrategyError;
use crate::{Strategy, StrategyContext, StrategyId};
use configuration::settings::KeyLevelEngulfingParams;
use core_types::{Candle, Direction, StrategyCandidate};
use std::fmt;

const ATR_PERIOD: usize = 14;
/// Candles after a swing inspected for the reversal that makes it "sharp".
const SHARPNESS_LOOKAHEAD: usize = 3;
const STOP_RANGE_BUFFER: f64 = 0.1;
const STORYLINE_MIN_CANDLES: usize = 20;
const STORYLINE_FAST_MA: usize = 20;
const STORYLINE_SLOW_MA: usize = 50;

/// The higher-timeframe market structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storyline {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Storyline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Storyline::Bullish => "bullish",
            Storyline::Bearish => "bearish",
            Storyline::Neutral => "neutral",
        })
    }
}

/// Engulfing candles at sharp higher-timeframe support and resistance.
///
/// Levels come from "A" and "V" shaped swings: a swing only counts when price
/// reverses hard away from it within a few candles.
pub struct KeyLevelEngulfing {
    params: KeyLevelEngulfingParams,
}

impl KeyLevelEngulfing {
    pub fn new(params: KeyLevelEngulfingParams) -> Result<Self, StrategyError> {
        if params.swing_window == 0 || params.storyline_swing_window == 0 {
            return Err(StrategyError::InvalidParameters(
                "swing windows must be greater than zero".to_string(),
            ));
        }
        if params.reward_ratio <= 0.0 || params.proximity <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "reward_ratio and proximity must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// Sharp swing levels of `candles`, merged, in ascending price order.
    pub fn key_levels(&self, candles: &[Candle]) -> Vec<KeyLevel> {
        let window = self.params.swing_window;
        let swings = analysis::find_swings(candles, window, window);
        let atr = analysis::atr_series(candles, ATR_PERIOD);
        let threshold = |swing: &SwingPoint| self.params.sharpness_atr_multiple * atr[swing.index];

        let lookahead = |swing: &SwingPoint| {
            let end = (swing.index + 1 + SHARPNESS_LOOKAHEAD).min(candles.len());
            &candles[swing.index + 1..end]
        };

        let mut levels = Vec::new();
        for swing in &swings.highs {
            let drop = lookahead(swing)
                .iter()
                .map(|c| swing.price - c.low)
                .fold(f64::MIN, f64::max);
            if drop > threshold(swing) {
                levels.push(KeyLevel::resistance(swing));
            }
        }
        for swing in &swings.lows {
            let rally = lookahead(swing)
                .iter()
                .map(|c| c.high - swing.price)
                .fold(f64::MIN, f64::max);
            if rally > threshold(swing) {
                levels.push(KeyLevel::support(swing));
            }
        }

        analysis::merge_levels(levels, self.params.merge_tolerance)
    }

    /// Reads the higher-timeframe structure.
    ///
    /// A fresh leg that breaks the earliest prior swing of the same type sets
    /// the storyline; otherwise the 20/50 moving-average relationship does.
    pub fn storyline(&self, higher_timeframe: &[Candle]) -> Result<Storyline, StrategyError> {
        if higher_timeframe.len() < STORYLINE_MIN_CANDLES {
            return Ok(Storyline::Neutral);
        }

        let window = self.params.storyline_swing_window;
        let swings = analysis::find_swings(higher_timeframe, window, window);

        // interleave highs and lows in time order
        let mut points: Vec<(bool, SwingPoint)> = swings
            .highs
            .iter()
            .map(|p| (true, *p))
            .chain(swings.lows.iter().map(|p| (false, *p)))
            .collect();
        points.sort_by_key(|(is_high, p)| (p.index, !*is_high));

        if let [.., (prev_is_high, _), (last_is_high, last)] = points.as_slice() {
            let earliest_prior = |want_high: bool| {
                points
                    .iter()
                    .find(|(is_high, p)| *is_high == want_high && p.time < last.time)
                    .map(|(_, p)| p.price)
            };
            match (prev_is_high, last_is_high) {
                (false, true) => {
                    if earliest_prior(true).is_some_and(|prior| last.price > prior) {
                        return Ok(Storyline::Bullish);
                    }
                }
                (true, false) => {
                    if earliest_prior(false).is_some_and(|prior| last.price < prior) {
                        return Ok(Storyline::Bearish);
                    }
                }
                _ => {}
            }
        }

        let closes: Vec<f64> = higher_timeframe.iter().map(|c| c.close).collect();
        let fast = analysis::sma(&closes, STORYLINE_FAST_MA)?;
        let slow = analysis::sma(&closes, STORYLINE_SLOW_MA)?;
        Ok(match (fast, slow) {
            (Some(fast), Some(slow)) if fast > slow => Storyline::Bullish,
            (Some(_), Some(_)) => Storyline::Bearish,
            _ => Storyline::Neutral,
        })
    }
}

/// Bearish engulfing that also closes below the previous low.
fn is_strong_bearish_engulfing(prev: &Candle, last: &Candle) -> bool {
    analysis::is_bearish(last)
        && last.open >= prev.close
        && last.close < prev.open
        && last.close < prev.low
}

fn is_strong_bullish_engulfing(prev: &Candle, last: &Candle) -> bool {
    analysis::is_bullish(last)
        && last.open <= prev.close
        && last.close > prev.open
        && last.close > prev.high
}

impl Strategy for KeyLevelEngulfing {
    fn id(&self) -> StrategyId {
        StrategyId::KeyLevelEngulfing
    }

    fn analyze(
        &self,
        candles: &[Candle],
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyCandidate>, StrategyError> {
        if candles.len() < self.params.min_candles.max(2) {
            return Ok(None);
        }
        let [.., prev, last] = candles else {
            return Ok(None);
        };

        let level_source = if ctx.higher_timeframe.is_empty() {
            candles
        } else {
            ctx.higher_timeframe
        };
        let levels = self.key_levels(level_source);

        let Some(level) = levels
            .iter()
            .find(|l| (last.close - l.price).abs() < self.params.proximity * l.price)
        else {
            return Ok(None);
        };

        let range = analysis::range(last);
        let (direction, stop_loss, label) = match level.kind {
            LevelKind::Resistance if is_strong_bearish_engulfing(prev, last) => (
                Direction::Sell,
                last.high.max(level.price) + STOP_RANGE_BUFFER * range,
                "resistance",
            ),
            LevelKind::Support if is_strong_bullish_engulfing(prev, last) => (
                Direction::Buy,
                last.low.min(level.price) - STOP_RANGE_BUFFER * range,
                "support",
            ),
            _ => return Ok(None),
        };

        let storyline = self.storyline(ctx.higher_timeframe)?;
        tracing::debug!(symbol = ctx.symbol, level = level.price, %storyline, "Engulfing at key level.");

        let confidence = (0.8 + 0.05 * level.strength as f64).min(1.0);
        let reason = format!(
            "Engulfing at key {label} {:.5} (strength {}), higher-timeframe storyline {storyline}",
            level.price, level.strength
        );

        Ok(Some(StrategyCandidate::with_reward_ratio(
            direction,
            last.close,
            stop_loss,
            self.params.reward_ratio,
            confidence,
            reason,
        )))
    }
}
