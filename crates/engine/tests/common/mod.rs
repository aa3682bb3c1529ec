//! In-memory collaborators shared by the engine integration tests.
#![allow(dead_code)]

use api_client::error::ApiError;
use api_client::MarketDataSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::ScannerSettings;
use core_types::{Candle, Direction, Market, RiskConfig, RiskProfile, ScanState, Signal, SignalResult, StrategyCandidate};
use database::{DbError, ScanStateStore, SignalStore};
use engine::{ScanOrchestrator, ScanServices, Selector};
use events::EngineEvent;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use strategies::{Strategy, StrategyContext, StrategyError, StrategyId};
use tokio::sync::broadcast;

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn flat_candles(len: usize, price: f64) -> Vec<Candle> {
    (0..len)
        .map(|i| Candle {
            time: i as i64 * 3_600_000,
            open: price,
            high: price + 0.001,
            low: price - 0.001,
            close: price,
            volume: 1.0,
        })
        .collect()
}

/// Market data with per-symbol failures and prices, recording every request.
#[derive(Default)]
pub struct FakeMarket {
    pub failing: HashSet<String>,
    pub failing_intervals: HashSet<String>,
    pub prices: HashMap<String, f64>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeMarket {
    pub fn failing(symbols: &[&str]) -> Self {
        Self {
            failing: symbols.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn symbols_fetched(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for (symbol, _) in self.calls() {
            if !seen.contains(&symbol) {
                seen.push(symbol);
            }
        }
        seen
    }
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, ApiError> {
        self.calls.lock().unwrap().push((symbol.to_string(), interval.to_string()));
        if self.failing.contains(symbol) || self.failing_intervals.contains(interval) {
            return Err(ApiError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        if let Some(price) = self.prices.get(symbol) {
            return Ok(flat_candles(limit.min(1), *price));
        }
        Ok(flat_candles(limit.min(60), 1.1))
    }
}

/// A signal and scan-state store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub signals: Mutex<Vec<Signal>>,
    pub state: Mutex<Option<ScanState>>,
    pub fail_inserts: bool,
}

impl MemoryStore {
    pub fn with_signals(signals: Vec<Signal>) -> Self {
        Self {
            signals: Mutex::new(signals),
            ..Self::default()
        }
    }

    pub fn saved_state(&self) -> Option<ScanState> {
        self.state.lock().unwrap().clone()
    }

    pub fn all(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, DbError> {
        Ok(self.all())
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DbError> {
        if self.fail_inserts {
            return Err(DbError::Unavailable("both stores down".to_string()));
        }
        self.signals.lock().unwrap().push(signal.clone());
        Ok(())
    }

    async fn update_signal_resolution(
        &self,
        id: &str,
        result: SignalResult,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        Ok(self
            .signals
            .lock()
            .unwrap()
            .iter_mut()
            .find(|s| s.id == id)
            .is_some_and(|s| s.close(result, closed_at)))
    }
}

#[async_trait]
impl ScanStateStore for MemoryStore {
    async fn load_scan_state(&self) -> Result<ScanState, DbError> {
        Ok(self.saved_state().unwrap_or_default())
    }

    async fn save_scan_state(&self, state: &ScanState) -> Result<(), DbError> {
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

/// Emits a fixed buy candidate for the listed symbols only.
pub struct SymbolStrategy {
    pub id: StrategyId,
    pub symbols: Vec<String>,
}

impl SymbolStrategy {
    pub fn boxed(id: StrategyId, symbols: &[&str]) -> Box<dyn Strategy> {
        Box::new(Self {
            id,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Strategy for SymbolStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn analyze(&self, candles: &[Candle], ctx: &StrategyContext<'_>) -> Result<Option<StrategyCandidate>, StrategyError> {
        if !self.symbols.iter().any(|s| s == ctx.symbol) {
            return Ok(None);
        }
        let Some(last) = candles.last() else {
            return Ok(None);
        };
        Ok(Some(StrategyCandidate::with_reward_ratio(
            Direction::Buy,
            last.close,
            last.close * 0.99,
            2.0,
            0.7,
            format!("fixed setup on {}", ctx.symbol),
        )))
    }
}

pub fn settings() -> ScannerSettings {
    ScannerSettings {
        forex: vec!["EURUSD".to_string(), "GBPUSD".to_string()],
        indices: vec!["US30".to_string()],
        crypto: vec!["BTCUSDT".to_string()],
        ..ScannerSettings::default()
    }
}

pub struct Harness {
    pub market: Arc<FakeMarket>,
    pub store: Arc<MemoryStore>,
    pub events: broadcast::Receiver<EngineEvent>,
    pub orchestrator: ScanOrchestrator,
}

/// An orchestrator over the fakes. Forex/indices symbols in `emitting` get a
/// candidate; crypto symbols in `emitting` get one from the crypto selector.
pub fn harness(market: FakeMarket, store: MemoryStore, emitting: &[&str], daily_limit: u32) -> Harness {
    let market = Arc::new(market);
    let store = Arc::new(store);
    let (tx, rx) = broadcast::channel(16);
    let services = ScanServices {
        market_data: market.clone(),
        signals: store.clone(),
        scan_state: store.clone(),
        risk: Arc::new(RiskConfig::from_profile(RiskProfile::Balanced, daily_limit)),
        events: tx,
    };
    let orchestrator = ScanOrchestrator::new(
        settings(),
        Selector::new(vec![SymbolStrategy::boxed(StrategyId::ZoneRejection, emitting)]),
        Selector::new(vec![SymbolStrategy::boxed(StrategyId::RangeBand, emitting)]),
        services,
    );
    Harness {
        market,
        store,
        events: rx,
        orchestrator,
    }
}

pub fn signal_created_at(created_at: DateTime<Utc>) -> Signal {
    let candidate = StrategyCandidate::with_reward_ratio(Direction::Buy, 1.1, 1.0, 2.0, 0.7, "old".to_string());
    Signal::from_candidate(&candidate, Market::Forex, "EURUSD", created_at, Duration::hours(24))
}
