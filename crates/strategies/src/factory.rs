use crate::breakout::Breakout;
use crate::error::StrategyError;
use crate::key_level_engulfing::KeyLevelEngulfing;
use crate::range_band::RangeBand;
use crate::zone_rejection::ZoneRejection;
use crate::{Strategy, StrategyId};
use configuration::Config;

/// Creates a new strategy instance based on the provided ID and configuration.
pub fn create_strategy(
    id: StrategyId,
    config: &Config,
) -> Result<Box<dyn Strategy>, StrategyError> {
    // The compiler errors here if a new StrategyId is added but not handled.
    match id {
        StrategyId::ZoneRejection => {
            let params = config.strategies.zone_rejection.clone();
            Ok(Box::new(ZoneRejection::new(params)?))
        }
        StrategyId::KeyLevelEngulfing => {
            let params = config.strategies.key_level_engulfing.clone();
            Ok(Box::new(KeyLevelEngulfing::new(params)?))
        }
        StrategyId::Breakout => {
            let params = config.strategies.breakout.clone();
            Ok(Box::new(Breakout::new(params)?))
        }
        StrategyId::RangeBand => {
            let params = config.strategies.range_band.clone();
            Ok(Box::new(RangeBand::new(params)?))
        }
    }
}

/// The advanced strategies run for forex and index symbols, in priority order.
pub fn forex_indices_strategies(config: &Config) -> Result<Vec<Box<dyn Strategy>>, StrategyError> {
    [
        StrategyId::ZoneRejection,
        StrategyId::KeyLevelEngulfing,
        StrategyId::Breakout,
    ]
    .into_iter()
    .map(|id| create_strategy(id, config))
    .collect()
}

/// The single range check run for crypto symbols.
pub fn crypto_strategies(config: &Config) -> Result<Vec<Box<dyn Strategy>>, StrategyError> {
    Ok(vec![create_strategy(StrategyId::RangeBand, config)?])
}
