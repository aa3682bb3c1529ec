//! Structural primitives shared by every strategy: candle geometry, true range
//! and ATR, swing detection, key-level merging and moving averages.
//!
//! All functions are pure and operate on candle slices ordered oldest to newest.

use crate::error::StrategyError;
use core_types::Candle;
use ta::indicators::SimpleMovingAverage;
use ta::Next as _;

// ==============================================================================
// Candle geometry
// ==============================================================================

pub fn body(candle: &Candle) -> f64 {
    (candle.close - candle.open).abs()
}

pub fn range(candle: &Candle) -> f64 {
    candle.high - candle.low
}

pub fn upper_wick(candle: &Candle) -> f64 {
    candle.high - candle.open.max(candle.close)
}

pub fn lower_wick(candle: &Candle) -> f64 {
    candle.open.min(candle.close) - candle.low
}

pub fn is_bullish(candle: &Candle) -> bool {
    candle.close > candle.open
}

pub fn is_bearish(candle: &Candle) -> bool {
    candle.close < candle.open
}

// ==============================================================================
// Volatility
// ==============================================================================

/// `max(high - low, |high - prev.close|, |low - prev.close|)`.
///
/// The first candle has no previous close, so its true range is its plain range.
pub fn true_range(candles: &[Candle], i: usize) -> f64 {
    let current = &candles[i];
    let plain = range(current);
    if i == 0 {
        return plain;
    }
    let prev_close = candles[i - 1].close;
    plain
        .max((current.high - prev_close).abs())
        .max((current.low - prev_close).abs())
}

/// Simple mean of the `period` true ranges ending at index `i`.
///
/// Each of those true ranges needs a previous close, so at least `period + 1`
/// candles must exist up to `i`; otherwise the result is `0.0`.
pub fn atr(candles: &[Candle], i: usize, period: usize) -> f64 {
    if period == 0 || i >= candles.len() || i < period {
        return 0.0;
    }
    let sum: f64 = (i + 1 - period..=i).map(|j| true_range(candles, j)).sum();
    sum / period as f64
}

/// ATR for every index of the series, `0.0` where there is not enough history.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; candles.len()];
    if period == 0 || candles.len() <= period {
        return out;
    }
    let ranges: Vec<f64> = (0..candles.len()).map(|i| true_range(candles, i)).collect();
    let mut window: f64 = ranges[1..=period].iter().sum();
    out[period] = window / period as f64;
    for i in period + 1..candles.len() {
        window += ranges[i] - ranges[i - period];
        out[i] = window / period as f64;
    }
    out
}

pub fn latest_atr(candles: &[Candle], period: usize) -> f64 {
    match candles.len() {
        0 => 0.0,
        len => atr(candles, len - 1, period),
    }
}

// ==============================================================================
// Swings
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub time: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Swings {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
}

/// Finds local extremes.
///
/// Index `i` is a swing high when its high strictly exceeds the high of every
/// candle up to `window` positions on either side (clipped at the end of the
/// series); swing lows mirror this. The first `window` candles and the last
/// `exclude_recent` candles are never candidates themselves. Passing
/// `exclude_recent = window` gives every candidate a full window on both sides.
pub fn find_swings(candles: &[Candle], window: usize, exclude_recent: usize) -> Swings {
    let mut swings = Swings::default();
    if window == 0 {
        return swings;
    }
    let end = candles.len().saturating_sub(exclude_recent);

    for i in window..end {
        let current = &candles[i];
        let right = (i + window).min(candles.len() - 1);
        let neighbours = candles[i - window..i]
            .iter()
            .chain(candles[i + 1..=right].iter());

        let (mut is_high, mut is_low) = (true, true);
        for other in neighbours {
            is_high &= current.high > other.high;
            is_low &= current.low < other.low;
            if !is_high && !is_low {
                break;
            }
        }

        if is_high {
            swings.highs.push(SwingPoint {
                index: i,
                time: current.time,
                price: current.high,
            });
        }
        if is_low {
            swings.lows.push(SwingPoint {
                index: i,
                time: current.time,
                price: current.low,
            });
        }
    }
    swings
}

// ==============================================================================
// Key levels
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub strength: u32,
    pub time: i64,
}

impl KeyLevel {
    pub fn resistance(swing: &SwingPoint) -> Self {
        Self {
            price: swing.price,
            kind: LevelKind::Resistance,
            strength: 1,
            time: swing.time,
        }
    }

    pub fn support(swing: &SwingPoint) -> Self {
        Self {
            price: swing.price,
            kind: LevelKind::Support,
            strength: 1,
            time: swing.time,
        }
    }
}

/// Collapses levels that sit within `tolerance` (relative) of each other.
///
/// Levels are sorted by price and merged in a single pass into the previously
/// accepted level: strengths add up, the later time is kept, and the price
/// moves to the more extreme side (higher for resistance, lower for support).
/// The result is in ascending price order.
pub fn merge_levels(mut levels: Vec<KeyLevel>, tolerance: f64) -> Vec<KeyLevel> {
    levels.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut merged: Vec<KeyLevel> = Vec::with_capacity(levels.len());
    for level in levels {
        match merged.last_mut() {
            Some(last)
                if last.price != 0.0
                    && ((level.price - last.price) / last.price).abs() < tolerance =>
            {
                last.strength += level.strength;
                last.time = last.time.max(level.time);
                last.price = match last.kind {
                    LevelKind::Resistance => last.price.max(level.price),
                    LevelKind::Support => last.price.min(level.price),
                };
            }
            _ => merged.push(level),
        }
    }
    merged
}

// ==============================================================================
// Moving averages
// ==============================================================================

/// Simple moving average of the last `period` values, `None` when there are
/// fewer than `period` values.
pub fn sma(values: &[f64], period: usize) -> Result<Option<f64>, StrategyError> {
    if period == 0 || values.len() < period {
        return Ok(None);
    }
    let mut indicator = SimpleMovingAverage::new(period)
        .map_err(|e| StrategyError::IndicatorError(format!("Failed to initialize SMA: {e:?}")))?;
    let mut last = None;
    for &value in &values[values.len() - period..] {
        last = Some(indicator.next(value));
    }
    Ok(last)
}

#[cfg(test)]
pub(crate) mod test_support {
    use core_types::Candle;

    pub const HOUR_MS: i64 = 3_600_000;

    pub fn candle(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: i as i64 * HOUR_MS,
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    /// Quiet candles oscillating around `price` with a constant range.
    pub fn flat_series(len: usize, price: f64, half_range: f64) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let drift = if i % 2 == 0 { 0.1 } else { -0.1 } * half_range;
                candle(
                    i,
                    price - drift,
                    price + half_range,
                    price - half_range,
                    price + drift,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn true_range_uses_previous_close_gaps() {
        let candles = vec![
            candle(0, 10.0, 11.0, 9.0, 10.5),
            candle(1, 13.0, 14.0, 12.5, 13.5),
        ];
        assert_eq!(true_range(&candles, 0), 2.0);
        // gap up: high - prev.close = 3.5 beats high - low = 1.5
        assert_eq!(true_range(&candles, 1), 3.5);
    }

    #[test]
    fn atr_needs_period_plus_one_candles() {
        let candles = flat_series(14, 100.0, 1.0);
        assert_eq!(latest_atr(&candles, 14), 0.0);

        let candles = flat_series(15, 100.0, 1.0);
        assert!((latest_atr(&candles, 14) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn atr_series_matches_pointwise_atr() {
        let mut candles = flat_series(40, 100.0, 1.0);
        candles[25] = candle(25, 100.0, 106.0, 99.0, 105.0);
        let series = atr_series(&candles, 14);
        for (i, value) in series.iter().enumerate() {
            assert!((value - atr(&candles, i, 14)).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn swing_requires_strict_extreme() {
        let mut candles = flat_series(11, 100.0, 1.0);
        candles[5] = candle(5, 100.0, 103.0, 99.0, 100.0);
        let swings = find_swings(&candles, 2, 2);
        assert_eq!(swings.highs.len(), 1);
        assert_eq!(swings.highs[0].index, 5);
        assert_eq!(swings.highs[0].price, 103.0);

        // an equal neighbour high kills the swing
        candles[6] = candle(6, 100.0, 103.0, 99.5, 100.0);
        let swings = find_swings(&candles, 2, 2);
        assert!(swings.highs.is_empty());
    }

    #[test]
    fn recent_candles_are_excluded() {
        let mut candles = flat_series(20, 100.0, 1.0);
        candles[17] = candle(17, 100.0, 105.0, 99.0, 100.0);
        assert!(find_swings(&candles, 2, 5).highs.is_empty());
        assert_eq!(find_swings(&candles, 2, 2).highs.len(), 1);
    }

    #[test]
    fn merge_collapses_nearby_levels() {
        let levels = vec![
            KeyLevel { price: 100.0, kind: LevelKind::Resistance, strength: 1, time: 5 },
            KeyLevel { price: 100.1, kind: LevelKind::Resistance, strength: 1, time: 2 },
            KeyLevel { price: 105.0, kind: LevelKind::Resistance, strength: 1, time: 9 },
        ];
        let merged = merge_levels(levels, 0.002);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].price, 100.1);
        assert_eq!(merged[0].strength, 2);
        assert_eq!(merged[0].time, 5);
        assert_eq!(merged[1].price, 105.0);
    }

    #[test]
    fn sma_of_last_values() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(sma(&values, 4).unwrap(), Some(8.5));
        assert_eq!(sma(&values, 11).unwrap(), None);
    }

    fn arb_levels() -> impl proptest::strategy::Strategy<Value = Vec<KeyLevel>> {
        let level = (50.0..150.0_f64, any::<bool>(), 0i64..1_000).prop_map(|(price, res, time)| KeyLevel {
            price,
            kind: if res { LevelKind::Resistance } else { LevelKind::Support },
            strength: 1,
            time,
        });
        proptest::collection::vec(level, 1..40)
    }

    proptest! {
        #[test]
        fn merging_preserves_total_strength(levels in arb_levels(), tolerance in 0.0005..0.01_f64) {
            let total: u32 = levels.iter().map(|l| l.strength).sum();
            let merged = merge_levels(levels, tolerance);
            prop_assert_eq!(merged.iter().map(|l| l.strength).sum::<u32>(), total);
        }

        #[test]
        fn merged_levels_move_only_outward(
            base in 50.0..150.0_f64,
            offsets in proptest::collection::vec(0.0..0.0009_f64, 1..10),
            resistance in any::<bool>(),
        ) {
            // every offset is within 0.1% of `base`, so everything merges into one
            let kind = if resistance { LevelKind::Resistance } else { LevelKind::Support };
            let mut levels = vec![KeyLevel { price: base, kind, strength: 1, time: 0 }];
            levels.extend(offsets.iter().enumerate().map(|(i, off)| KeyLevel {
                price: base * (1.0 + off),
                kind,
                strength: 1,
                time: i as i64 + 1,
            }));
            let count = levels.len() as u32;
            let merged = merge_levels(levels, 0.001);
            prop_assert_eq!(merged.len(), 1);
            prop_assert_eq!(merged[0].strength, count);
            prop_assert!(merged[0].strength > 1);
            match kind {
                LevelKind::Resistance => prop_assert!(merged[0].price >= base),
                LevelKind::Support => prop_assert!(merged[0].price <= base),
            }
            prop_assert_eq!(merged[0].time, count as i64 - 1);
        }
    }
}
