use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Risk parameters are invalid: {0}")]
    InvalidParameters(String),

    #[error("Stop-loss or take-profit is on the wrong side of entry: {0}")]
    InvalidPlacement(String),

    #[error("Best reward/risk {best:.2} is below the required minimum {min:.2}")]
    Rejected { best: f64, min: f64 },
}
