use crate::error::StrategyError;
use crate::{Strategy, StrategyContext, StrategyId};
use configuration::settings::RangeBandParams;
use core_types::{Candle, Direction, StrategyCandidate, TakeProfit};

/// Buying the bottom and selling the top of the recent higher-timeframe range.
///
/// This is the only check run for crypto symbols.
pub struct RangeBand {
    params: RangeBandParams,
}

impl RangeBand {
    pub fn new(params: RangeBandParams) -> Result<Self, StrategyError> {
        if params.lookback == 0 {
            return Err(StrategyError::InvalidParameters(
                "lookback must be greater than zero".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// `(support, resistance)` of the last `lookback` candles.
    fn band(&self, candles: &[Candle]) -> (f64, f64) {
        let start = candles.len().saturating_sub(self.params.lookback);
        candles[start..]
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), c| (lo.min(c.low), hi.max(c.high)))
    }
}

impl Strategy for RangeBand {
    fn id(&self) -> StrategyId {
        StrategyId::RangeBand
    }

    fn analyze(
        &self,
        candles: &[Candle],
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyCandidate>, StrategyError> {
        let min = self.params.min_candles.max(1);
        if candles.len() < min || ctx.higher_timeframe.len() < min {
            return Ok(None);
        }
        let Some(last) = candles.last() else {
            return Ok(None);
        };

        let (support, resistance) = self.band(ctx.higher_timeframe);
        let price = last.close;

        let (direction, stop_loss, take_profit, reason) = if price < support * 1.01 {
            (
                Direction::Buy,
                support * 0.98,
                resistance * 0.98,
                format!("Price {price} near range support {support}"),
            )
        } else if price > resistance * 0.99 {
            (
                Direction::Sell,
                resistance * 1.02,
                support * 1.02,
                format!("Price {price} near range resistance {resistance}"),
            )
        } else {
            return Ok(None);
        };

        Ok(Some(StrategyCandidate {
            direction,
            entry: price,
            stop_loss,
            take_profit: TakeProfit::Single(take_profit),
            confidence: self.params.confidence.clamp(0.0, 1.0),
            reason,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{candle, flat_series};

    fn strategy() -> RangeBand {
        RangeBand::new(RangeBandParams::default()).unwrap()
    }

    #[test]
    fn close_near_support_is_a_buy() {
        // higher timeframe ranging between 95 and 105
        let htf = flat_series(60, 100.0, 5.0);
        let mut ltf = flat_series(60, 100.0, 0.2);
        ltf[59] = candle(59, 95.8, 95.9, 95.3, 95.5);

        let ctx = StrategyContext::new("BTCUSDT", &htf);
        let candidate = strategy().analyze(&ltf, &ctx).unwrap().unwrap();
        assert_eq!(candidate.direction, Direction::Buy);
        assert_eq!(candidate.entry, 95.5);
        assert!((candidate.stop_loss - 95.0 * 0.98).abs() < 1e-9);
        assert_eq!(candidate.take_profit, TakeProfit::Single(105.0 * 0.98));
        assert_eq!(candidate.confidence, 0.5);
    }

    #[test]
    fn close_near_resistance_is_a_sell() {
        let htf = flat_series(60, 100.0, 5.0);
        let mut ltf = flat_series(60, 100.0, 0.2);
        ltf[59] = candle(59, 104.1, 104.6, 104.0, 104.5);

        let ctx = StrategyContext::new("ETHUSDT", &htf);
        let candidate = strategy().analyze(&ltf, &ctx).unwrap().unwrap();
        assert_eq!(candidate.direction, Direction::Sell);
        assert!((candidate.stop_loss - 105.0 * 1.02).abs() < 1e-9);
        assert_eq!(candidate.take_profit, TakeProfit::Single(95.0 * 1.02));
    }

    #[test]
    fn mid_range_and_missing_history_yield_nothing() {
        let htf = flat_series(60, 100.0, 5.0);
        // closes hover around 100, far from both edges of the band
        let ltf = flat_series(60, 100.0, 0.2);
        let ctx = StrategyContext::new("BTCUSDT", &htf);
        assert!(strategy().analyze(&ltf, &ctx).unwrap().is_none());

        let ctx = StrategyContext::new("BTCUSDT", &htf[..49]);
        assert!(strategy().analyze(&ltf, &ctx).unwrap().is_none());
    }
}
