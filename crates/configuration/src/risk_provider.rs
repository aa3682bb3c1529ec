use crate::error::ConfigError;
use crate::settings::RiskSettings;
use core_types::{RiskConfig, RiskProfile};
use std::path::PathBuf;

/// Supplies the risk policy for a scan. Read once at the start of each scan.
pub trait RiskConfigProvider: Send + Sync {
    fn risk_config(&self) -> Result<RiskConfig, ConfigError>;
}

/// A fixed policy, useful when the configuration is loaded once up front.
impl RiskConfigProvider for RiskConfig {
    fn risk_config(&self) -> Result<RiskConfig, ConfigError> {
        Ok(*self)
    }
}

/// Re-reads the configuration sources on every call, so edits to the risk
/// section take effect on the next scan without a restart.
#[derive(Debug, Clone)]
pub struct SettingsRiskProvider {
    path: PathBuf,
}

impl SettingsRiskProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RiskConfigProvider for SettingsRiskProvider {
    fn risk_config(&self) -> Result<RiskConfig, ConfigError> {
        let config = crate::load_config_from(&self.path)?;
        resolve_risk_config(&config.risk, |key| std::env::var(key).ok())
    }
}

/// Resolves the effective policy from settings plus the `RISK_PROFILE`,
/// `MIN_RR` and `DAILY_LIMIT` overrides.
///
/// `min_rr` precedence: `MIN_RR`, then an explicit `min_rr` setting, then the
/// profile's threshold.
pub fn resolve_risk_config<F>(settings: &RiskSettings, env: F) -> Result<RiskConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let risk_profile = match env("RISK_PROFILE") {
        Some(raw) => raw
            .parse::<RiskProfile>()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?,
        None => settings.risk_profile,
    };

    let env_min_rr = env("MIN_RR")
        .map(|raw| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::ValidationError(format!("MIN_RR is not a number: {raw}")))
        })
        .transpose()?;
    let min_rr = env_min_rr
        .or(settings.min_rr)
        .unwrap_or_else(|| risk_profile.min_rr());
    if !min_rr.is_finite() || min_rr <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "min_rr must be a positive number, got {min_rr}"
        )));
    }

    let daily_limit = match env("DAILY_LIMIT") {
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "DAILY_LIMIT is not a non-negative integer: {raw}"
            ))
        })?,
        None => settings.daily_limit,
    };

    Ok(RiskConfig {
        min_rr,
        daily_limit,
        risk_profile,
    })
}
