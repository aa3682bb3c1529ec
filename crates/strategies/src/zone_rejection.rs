use crate::error::StrategyError;
use crate::zones::{self, SupplyDemandZone, ZoneKind};
use crate::{Strategy, StrategyContext, StrategyId};
use configuration::settings::ZoneRejectionParams;
use core_types::{Candle, Direction, StrategyCandidate};

/// Trades a rejection candle inside an intact supply or demand zone.
///
/// Only symbols on the configured allow-list are considered.
pub struct ZoneRejection {
    params: ZoneRejectionParams,
}

impl ZoneRejection {
    pub fn new(params: ZoneRejectionParams) -> Result<Self, StrategyError> {
        if params.reward_ratio <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "reward_ratio must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn is_allowed(&self, symbol: &str) -> bool {
        self.params
            .symbols
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

/// The strongest zone containing `price`; the newest one wins ties.
fn strongest_containing(zones: &[SupplyDemandZone], price: f64) -> Option<&SupplyDemandZone> {
    zones
        .iter()
        .filter(|zone| zones::is_in_zone(price, zone))
        .fold(None, |best: Option<&SupplyDemandZone>, zone| match best {
            Some(b) if b.strength >= zone.strength => Some(b),
            _ => Some(zone),
        })
}

impl Strategy for ZoneRejection {
    fn id(&self) -> StrategyId {
        StrategyId::ZoneRejection
    }

    fn analyze(
        &self,
        candles: &[Candle],
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyCandidate>, StrategyError> {
        if !self.is_allowed(ctx.symbol) || candles.len() < self.params.min_candles.max(2) {
            return Ok(None);
        }
        let Some(last) = candles.last() else {
            return Ok(None);
        };

        let zones = zones::detect_zones(candles);
        let Some(zone) = strongest_containing(&zones, last.close) else {
            return Ok(None);
        };
        if !zones::rejection_at(candles, zone) {
            tracing::debug!(symbol = ctx.symbol, "Price inside zone without rejection.");
            return Ok(None);
        }

        let (direction, label) = match zone.kind {
            ZoneKind::Demand => (Direction::Buy, "demand"),
            ZoneKind::Supply => (Direction::Sell, "supply"),
        };
        let liquidity_bonus = if zone.liquidity.is_some() { 0.2 } else { 0.0 };
        let confidence = (0.5 + 0.1 * zone.strength as f64 + liquidity_bonus).min(0.9);
        let reason = format!(
            "Rejection from {label} zone {:.5}-{:.5} (strength {}{})",
            zone.low,
            zone.high,
            zone.strength,
            if zone.liquidity.is_some() {
                ", liquidity resting at the edge"
            } else {
                ", no liquidity"
            }
        );

        Ok(Some(StrategyCandidate::with_reward_ratio(
            direction,
            zone.entry,
            zone.stop_loss,
            self.params.reward_ratio,
            confidence,
            reason,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::candle;
    use crate::zones::fixtures::demand_series;
    use core_types::TakeProfit;

    fn strategy() -> ZoneRejection {
        ZoneRejection::new(ZoneRejectionParams::default()).unwrap()
    }

    /// The demand fixture followed by a pullback into the zone and a hammer.
    fn pullback_with_hammer() -> Vec<Candle> {
        let mut candles = demand_series();
        let n = candles.len();
        // pull back into the 99.36..=100.1 band without closing through the stop
        candles[n - 2] = candle(n - 2, 101.0, 101.1, 99.9, 100.0);
        candles[n - 1] = candle(n - 1, 99.95, 100.0, 99.4, 99.98);
        candles
    }

    #[test]
    fn hammer_in_demand_zone_is_a_buy() {
        let candles = pullback_with_hammer();
        let ctx = StrategyContext::new("eurusd", &[]);
        let candidate = strategy().analyze(&candles, &ctx).unwrap().unwrap();

        assert_eq!(candidate.direction, Direction::Buy);
        assert_eq!(candidate.entry, 100.1);
        assert!(candidate.stop_loss < 99.6);
        let risk = candidate.entry - candidate.stop_loss;
        match candidate.take_profit {
            TakeProfit::Single(tp) => assert!((tp - (candidate.entry + 2.0 * risk)).abs() < 1e-9),
            TakeProfit::Ladder(_) => panic!("expected a single target"),
        }
        assert!((candidate.confidence - 0.7).abs() < 1e-9);
        assert!(candidate.reason.contains("demand"));
    }

    #[test]
    fn symbols_outside_the_allow_list_are_ignored() {
        let candles = pullback_with_hammer();
        let ctx = StrategyContext::new("BTCUSDT", &[]);
        assert!(strategy().analyze(&candles, &ctx).unwrap().is_none());
    }

    #[test]
    fn no_rejection_means_no_candidate() {
        let mut candles = pullback_with_hammer();
        let n = candles.len();
        candles[n - 1] = candle(n - 1, 100.05, 100.1, 99.7, 99.75);
        let ctx = StrategyContext::new("EURUSD", &[]);
        assert!(strategy().analyze(&candles, &ctx).unwrap().is_none());
    }

    #[test]
    fn ties_keep_the_newest_zone() {
        let older = SupplyDemandZone {
            kind: ZoneKind::Demand,
            high: 10.0,
            low: 9.0,
            entry: 10.0,
            stop_loss: 8.0,
            strength: 2,
            valid_from: 1,
            liquidity: None,
        };
        let newer = SupplyDemandZone {
            valid_from: 2,
            ..older.clone()
        };
        let zones = vec![newer.clone(), older];
        assert_eq!(strongest_containing(&zones, 9.5), Some(&newer));
    }
}
