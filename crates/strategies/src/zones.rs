//! Supply and demand zone detection.
//!
//! A zone is the small "base" candle that precedes an impulsive candle. Zones
//! are recomputed from scratch on every pass and never persisted.

use crate::analysis::{self, find_swings};
use core_types::Candle;
use serde::Serialize;

/// Fewer candles than this yields no zones.
pub const MIN_CANDLES: usize = 50;
/// The first candles of the series are warm-up for the ATR.
const WARM_UP: usize = 20;
const ATR_PERIOD: usize = 14;
const IMPULSE_ATR_MULTIPLE: f64 = 1.5;
const BASE_BODY_RATIO: f64 = 0.6;
const STOP_BUFFER_ATR: f64 = 0.2;
const BASE_STRENGTH: u32 = 2;
const LIQUIDITY_SWING_WINDOW: usize = 2;
const LIQUIDITY_PROXIMITY: f64 = 0.002;
const SMALL_BODY_RATIO: f64 = 0.3;
const WICK_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Supply,
    Demand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityKind {
    EqualHighs,
    EqualLows,
}

/// Resting liquidity (clustered swing extremes) sitting at a zone's edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Liquidity {
    pub level: f64,
    pub kind: LiquidityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyDemandZone {
    pub kind: ZoneKind,
    pub high: f64,
    pub low: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub strength: u32,
    /// Open time of the base candle.
    pub valid_from: i64,
    pub liquidity: Option<Liquidity>,
}

/// Detects the zones that are still intact at the end of `candles`, newest first.
pub fn detect_zones(candles: &[Candle]) -> Vec<SupplyDemandZone> {
    if candles.len() < MIN_CANDLES {
        return Vec::new();
    }

    let atr = analysis::atr_series(candles, ATR_PERIOD);
    let mut zones = Vec::new();

    // --- 1. Base candles in front of impulsive moves ---
    for i in WARM_UP..candles.len() - 2 {
        let impulse = &candles[i];
        let impulse_body = analysis::body(impulse);
        if impulse_body <= IMPULSE_ATR_MULTIPLE * atr[i] {
            continue;
        }
        let base = &candles[i - 1];
        if analysis::body(base) >= BASE_BODY_RATIO * impulse_body {
            continue;
        }

        let buffer = STOP_BUFFER_ATR * atr[i];
        if analysis::is_bullish(impulse) {
            let top = base.open.max(base.close);
            zones.push(SupplyDemandZone {
                kind: ZoneKind::Demand,
                high: top,
                low: base.low,
                entry: top,
                stop_loss: base.low - buffer,
                strength: BASE_STRENGTH,
                valid_from: base.time,
                liquidity: None,
            });
        } else if analysis::is_bearish(impulse) {
            let bottom = base.open.min(base.close);
            let outer = base.high + buffer;
            zones.push(SupplyDemandZone {
                kind: ZoneKind::Supply,
                high: outer,
                low: bottom,
                entry: bottom,
                stop_loss: outer,
                strength: BASE_STRENGTH,
                valid_from: base.time,
                liquidity: None,
            });
        }
    }

    // --- 2. Liquidity resting at the zone edge ---
    let swings = find_swings(candles, LIQUIDITY_SWING_WINDOW, LIQUIDITY_SWING_WINDOW);
    for zone in &mut zones {
        let (edge, points, kind) = match zone.kind {
            ZoneKind::Supply => (zone.high, &swings.highs, LiquidityKind::EqualHighs),
            ZoneKind::Demand => (zone.low, &swings.lows, LiquidityKind::EqualLows),
        };
        let touches = points
            .iter()
            .filter(|p| (p.price - edge).abs() < LIQUIDITY_PROXIMITY * edge)
            .count();
        if touches >= 2 {
            zone.liquidity = Some(Liquidity { level: edge, kind });
            zone.strength += 1;
        }
    }

    // --- 3. Drop zones whose stop has been closed through ---
    zones.retain(|zone| !is_invalidated(zone, candles));

    zones.sort_by(|a, b| b.valid_from.cmp(&a.valid_from));
    zones
}

fn is_invalidated(zone: &SupplyDemandZone, candles: &[Candle]) -> bool {
    candles
        .iter()
        .filter(|c| c.time > zone.valid_from)
        .any(|c| match zone.kind {
            ZoneKind::Supply => c.close > zone.stop_loss,
            ZoneKind::Demand => c.close < zone.stop_loss,
        })
}

/// Whether `price` lies between the zone's inner edge and its stop-loss,
/// both ends inclusive.
pub fn is_in_zone(price: f64, zone: &SupplyDemandZone) -> bool {
    match zone.kind {
        ZoneKind::Supply => zone.low <= price && price <= zone.stop_loss,
        ZoneKind::Demand => zone.stop_loss <= price && price <= zone.high,
    }
}

/// Whether the last candle rejects the zone: a pin bar pointing into the zone
/// or an engulfing candle leaving it.
pub fn rejection_at(candles: &[Candle], zone: &SupplyDemandZone) -> bool {
    let [.., prev, last] = candles else {
        return false;
    };

    let range = analysis::range(last);
    let small_body = analysis::body(last) < SMALL_BODY_RATIO * range;

    match zone.kind {
        ZoneKind::Supply => {
            let shooting_star = small_body && analysis::upper_wick(last) > WICK_RATIO * range;
            let engulfing =
                analysis::is_bearish(last) && last.close < prev.low && last.open > prev.high;
            shooting_star || engulfing
        }
        ZoneKind::Demand => {
            let hammer = small_body && analysis::lower_wick(last) > WICK_RATIO * range;
            let engulfing =
                analysis::is_bullish(last) && last.close > prev.high && last.open < prev.low;
            hammer || engulfing
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::analysis::test_support::{candle, flat_series};
    use core_types::Candle;

    /// Index of the base candle in [`demand_series`].
    pub const BASE: usize = 40;

    /// 60 quiet candles around 100 with a small base at [`BASE`] followed by
    /// a strong bullish impulse and a mild drift higher.
    pub fn demand_series() -> Vec<Candle> {
        let mut candles = flat_series(60, 100.0, 0.5);
        candles[BASE] = candle(BASE, 100.0, 100.4, 99.6, 100.1);
        candles[BASE + 1] = candle(BASE + 1, 100.1, 104.2, 100.0, 104.0);
        for i in BASE + 2..60 {
            let mid = 104.0 + (i - BASE - 2) as f64 * 0.05;
            candles[i] = candle(i, mid - 0.05, mid + 0.5, mid - 0.5, mid + 0.05);
        }
        candles
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::analysis::test_support::{candle, flat_series};

    #[test]
    fn short_series_has_no_zones() {
        let mut candles = demand_series();
        candles.truncate(49);
        assert!(detect_zones(&candles).is_empty());
    }

    #[test]
    fn single_impulse_yields_one_demand_zone_at_the_base() {
        let candles = demand_series();
        let zones = detect_zones(&candles);
        assert_eq!(zones.len(), 1, "{zones:?}");

        let zone = &zones[0];
        let base = &candles[BASE];
        assert_eq!(zone.kind, ZoneKind::Demand);
        assert_eq!(zone.valid_from, base.time);
        assert_eq!(zone.low, base.low);
        assert_eq!(zone.high, base.open.max(base.close));
        assert_eq!(zone.entry, zone.high);
        assert!(zone.stop_loss < base.low);
        assert_eq!(zone.strength, 2);
        assert!(zone.liquidity.is_none());
    }

    #[test]
    fn close_through_stop_invalidates_for_good() {
        let mut candles = demand_series();
        let stop = detect_zones(&candles)[0].stop_loss;

        // a later candle closes below the stop
        candles[55] = candle(55, 104.0, 104.2, stop - 1.0, stop - 0.5);
        let base_time = candles[BASE].time;
        assert!(detect_zones(&candles).iter().all(|z| z.valid_from != base_time));

        // adding more history after the break never revives the zone
        for extra in 0..5 {
            let i = candles.len();
            candles.push(candle(i, 104.0, 104.5, 103.5, 104.1 + extra as f64 * 0.01));
            assert!(detect_zones(&candles).iter().all(|z| z.valid_from != base_time));
        }
    }

    #[test]
    fn bearish_impulse_yields_supply_with_buffered_high() {
        let mut candles = flat_series(60, 100.0, 0.5);
        candles[40] = candle(40, 100.0, 100.4, 99.6, 99.9);
        candles[41] = candle(41, 99.9, 100.0, 95.8, 96.0);
        for i in 42..60 {
            let mid = 96.0 - (i - 42) as f64 * 0.05;
            candles[i] = candle(i, mid + 0.05, mid + 0.5, mid - 0.5, mid - 0.05);
        }
        let zones = detect_zones(&candles);
        assert_eq!(zones.len(), 1);
        let zone = &zones[0];
        assert_eq!(zone.kind, ZoneKind::Supply);
        assert_eq!(zone.high, zone.stop_loss);
        assert!(zone.stop_loss > 100.4);
        assert_eq!(zone.low, 99.9);
        assert_eq!(zone.entry, 99.9);
    }

    #[test]
    fn membership_is_inclusive_of_both_edges() {
        let zone = SupplyDemandZone {
            kind: ZoneKind::Demand,
            high: 1.10,
            low: 1.09,
            entry: 1.10,
            stop_loss: 1.08,
            strength: 2,
            valid_from: 0,
            liquidity: None,
        };
        assert!(is_in_zone(1.10, &zone));
        assert!(is_in_zone(1.08, &zone));
        assert!(!is_in_zone(1.1001, &zone));
        assert!(!is_in_zone(1.0799, &zone));
    }

    #[test]
    fn hammer_and_engulfing_reject_demand() {
        let zone = SupplyDemandZone {
            kind: ZoneKind::Demand,
            high: 100.0,
            low: 99.0,
            entry: 100.0,
            stop_loss: 98.5,
            strength: 2,
            valid_from: 0,
            liquidity: None,
        };
        let prev = candle(0, 100.0, 100.2, 99.5, 99.6);
        let hammer = candle(1, 99.8, 99.9, 98.9, 99.85);
        assert!(rejection_at(&[prev, hammer], &zone));

        let engulfing = candle(1, 99.4, 100.5, 99.3, 100.4);
        assert!(rejection_at(&[prev, engulfing], &zone));

        let plain = candle(1, 99.6, 99.9, 99.4, 99.5);
        assert!(!rejection_at(&[prev, plain], &zone));
        assert!(!rejection_at(&[plain], &zone));
    }
}
