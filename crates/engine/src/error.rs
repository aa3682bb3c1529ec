use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Strategy error: {0}")]
    Strategy(#[from] strategies::StrategyError),
}
