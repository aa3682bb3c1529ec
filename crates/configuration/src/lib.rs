use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod risk_provider;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use risk_provider::{resolve_risk_config, RiskConfigProvider, SettingsRiskProvider};
pub use settings::{
    BreakoutParams, Config, KeyLevelEngulfingParams, LoggingSettings, MarketDataSettings,
    MonitorSettings, RangeBandParams, RiskSettings, ScannerSettings, Strategies, StoreSettings,
    TelegramConfig, ZoneRejectionParams,
};

/// Environment variables with this prefix override file values, using `__`
/// between nested keys (e.g. `TRADEWIND_TELEGRAM__TOKEN`).
pub const ENV_PREFIX: &str = "TRADEWIND";

/// Longest accepted scan backoff (one week).
pub const MAX_BACKOFF_SECS: i64 = 7 * 24 * 60 * 60;
/// Longest accepted signal lifetime (thirty days).
pub const MAX_SIGNAL_TTL_HOURS: i64 = 30 * 24;

/// Loads the application configuration from the `config.toml` file.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Loads the configuration from `path` (which may be absent) layered under the
/// environment, and validates it.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;
    tracing::debug!(path = %path.display(), "Configuration loaded.");

    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let scanner = &config.scanner;
    if scanner.forex.is_empty() && scanner.indices.is_empty() && scanner.crypto.is_empty() {
        return Err(ConfigError::ValidationError(
            "scanner has no symbols to scan".to_string(),
        ));
    }
    if scanner.tick_secs == 0 || config.monitor.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler intervals must be greater than zero".to_string(),
        ));
    }
    for (name, secs) in [
        ("emitted_backoff_secs", scanner.emitted_backoff_secs),
        ("no_signal_backoff_secs", scanner.no_signal_backoff_secs),
        ("limit_backoff_secs", scanner.limit_backoff_secs),
    ] {
        if !(1..=MAX_BACKOFF_SECS).contains(&secs) {
            return Err(ConfigError::ValidationError(format!(
                "scanner.{name} must be between 1 and {MAX_BACKOFF_SECS}, got {secs}"
            )));
        }
    }
    if !(1..=MAX_SIGNAL_TTL_HOURS).contains(&scanner.signal_ttl_hours) {
        return Err(ConfigError::ValidationError(format!(
            "scanner.signal_ttl_hours must be between 1 and {MAX_SIGNAL_TTL_HOURS}, got {}",
            scanner.signal_ttl_hours
        )));
    }
    if config.market_data.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "market_data.timeout_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Command-line arguments shared by every subcommand that needs configuration.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file. A missing file means "defaults".
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: std::path::PathBuf,
}
