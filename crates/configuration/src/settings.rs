use core_types::RiskProfile;
use serde::Deserialize;

/// The root configuration structure for the entire application.
///
/// Every section carries defaults, so a missing `config.toml` still yields a
/// runnable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub risk: RiskSettings,
    pub scanner: ScannerSettings,
    pub monitor: MonitorSettings,
    pub market_data: MarketDataSettings,
    pub strategies: Strategies,
    pub telegram: TelegramConfig,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// Contains the signal-level risk policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub risk_profile: RiskProfile,
    /// Overrides the profile's minimum reward/risk when set.
    pub min_rr: Option<f64>,
    /// Maximum number of signals emitted per UTC day.
    pub daily_limit: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_profile: RiskProfile::Balanced,
            min_rr: None,
            daily_limit: 10,
        }
    }
}

/// Symbols, timeframes and backoff policy for the scan orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// Scanned first, in order.
    pub forex: Vec<String>,
    /// Scanned after forex.
    pub indices: Vec<String>,
    /// Scanned last with the range-band check.
    pub crypto: Vec<String>,
    pub working_interval: String,
    pub higher_interval: String,
    pub crypto_working_interval: String,
    pub crypto_higher_interval: String,
    pub candle_limit: u32,
    /// How often the scheduler checks whether a scan is due.
    pub tick_secs: u64,
    pub emitted_backoff_secs: i64,
    pub no_signal_backoff_secs: i64,
    pub limit_backoff_secs: i64,
    pub signal_ttl_hours: i64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            forex: to_strings(&["EURUSD", "GBPUSD", "USDJPY", "AUDUSD"]),
            indices: to_strings(&["US30", "US100", "US500"]),
            crypto: to_strings(&["BTCUSDT", "ETHUSDT"]),
            working_interval: "1h".to_string(),
            higher_interval: "4h".to_string(),
            crypto_working_interval: "15m".to_string(),
            crypto_higher_interval: "4h".to_string(),
            candle_limit: 500,
            tick_secs: 60,
            emitted_backoff_secs: 60 * 60,
            no_signal_backoff_secs: 5 * 60,
            limit_backoff_secs: 10 * 60,
            signal_ttl_hours: 24,
        }
    }
}

/// Parameters for the signal monitor loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    /// Close signals past their expiry as `EXPIRED`.
    pub expire_signals: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3 * 60,
            expire_signals: true,
        }
    }
}

/// Connection settings for the price-history provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    pub base_url: String,
    /// Optional; sent as `X-MBX-APIKEY` when non-empty.
    pub api_key: String,
    /// Upper bound on every request, connect included.
    pub timeout_secs: u64,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Contains the parameter sets for all available strategies.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Strategies {
    pub zone_rejection: ZoneRejectionParams,
    pub key_level_engulfing: KeyLevelEngulfingParams,
    pub breakout: BreakoutParams,
    pub range_band: RangeBandParams,
}

/// Parameters for the supply/demand zone rejection strategy.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ZoneRejectionParams {
    /// Symbols the strategy is allowed to trade (matched case-insensitively).
    pub symbols: Vec<String>,
    pub min_candles: usize,
    pub reward_ratio: f64,
}

impl Default for ZoneRejectionParams {
    fn default() -> Self {
        Self {
            symbols: to_strings(&[
                "EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "NZDUSD", "USDCHF", "US30",
                "US100", "US500", "FTSE100", "DAX", "NIKKEI", "ASX200",
            ]),
            min_candles: 50,
            reward_ratio: 2.0,
        }
    }
}

/// Parameters for the key-level engulfing strategy.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KeyLevelEngulfingParams {
    pub min_candles: usize,
    pub swing_window: usize,
    /// A swing only becomes a level if the following reversal exceeds this many ATRs.
    pub sharpness_atr_multiple: f64,
    pub merge_tolerance: f64,
    /// Maximum relative distance between the close and a level.
    pub proximity: f64,
    pub reward_ratio: f64,
    pub storyline_swing_window: usize,
}

impl Default for KeyLevelEngulfingParams {
    fn default() -> Self {
        Self {
            min_candles: 50,
            swing_window: 5,
            sharpness_atr_multiple: 2.0,
            merge_tolerance: 0.001,
            proximity: 0.002,
            reward_ratio: 3.0,
            storyline_swing_window: 3,
        }
    }
}

/// Parameters for the key-level breakout strategy.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BreakoutParams {
    pub min_candles: usize,
    pub swing_window: usize,
    /// The most recent candles are never used as level anchors.
    pub exclude_recent: usize,
    pub merge_tolerance: f64,
    /// Levels further than this (relative to the close) are ignored.
    pub max_distance: f64,
    /// Minimum body/range ratio of the breakout candle.
    pub min_body_ratio: f64,
    pub stop_atr_multiple: f64,
    pub reward_ratio: f64,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self {
            min_candles: 50,
            swing_window: 10,
            exclude_recent: 5,
            merge_tolerance: 0.002,
            max_distance: 0.02,
            min_body_ratio: 0.6,
            stop_atr_multiple: 1.5,
            reward_ratio: 2.0,
        }
    }
}

/// Parameters for the crypto support/resistance band check.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RangeBandParams {
    pub min_candles: usize,
    pub lookback: usize,
    pub confidence: f64,
}

impl Default for RangeBandParams {
    fn default() -> Self {
        Self {
            min_candles: 50,
            lookback: 20,
            confidence: 0.5,
        }
    }
}

/// Credentials for the Telegram alerter. Empty values disable it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

/// Settings for the file-based signal store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub data_dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub directory: String,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "tradewind.log".to_string(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
