use crate::error::EngineError;
use crate::selector::{Selection, Selector};
use api_client::MarketDataSource;
use chrono::{DateTime, Duration, Utc};
use configuration::{Config, RiskConfigProvider, ScannerSettings};
use core_types::{Market, ScanState, Signal};
use database::{ScanStateStore, SignalStore};
use events::{EngineEvent, LogLevel, LogMessage};
use risk::RiskEvaluator;
use std::sync::Arc;
use strategies::{StrategyContext, StrategyId};
use tokio::sync::{broadcast, Mutex};

/// What a call to [`ScanOrchestrator::tick`] or [`ScanOrchestrator::scan`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Another scan was in flight; nothing happened.
    Busy,
    /// The next scan is not due yet; nothing was read or written.
    NotDue { next_scan_at: DateTime<Utc> },
    /// Today's signal budget is spent; no market data was fetched.
    LimitReached { today: usize, limit: u32 },
    Emitted { signal: Signal, strategy: StrategyId },
    NoSignal,
}

const FALLBACK_BACKOFF_MINUTES: i64 = 5;
const FALLBACK_TTL_HOURS: i64 = 24;

/// `now + secs`, or the five-minute backoff when `secs` is not a usable delay.
fn next_scan_after(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    Duration::try_seconds(secs)
        .filter(|delay| *delay > Duration::zero())
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or_else(|| {
            tracing::warn!(secs, "Unusable scan backoff, falling back to five minutes.");
            now + Duration::minutes(FALLBACK_BACKOFF_MINUTES)
        })
}

fn signal_ttl(now: DateTime<Utc>, hours: i64) -> Duration {
    Duration::try_hours(hours)
        .filter(|ttl| *ttl > Duration::zero() && now.checked_add_signed(*ttl).is_some())
        .unwrap_or_else(|| {
            tracing::warn!(hours, "Unusable signal lifetime, falling back to 24 hours.");
            Duration::hours(FALLBACK_TTL_HOURS)
        })
}

/// The collaborators a scan talks to.
#[derive(Clone)]
pub struct ScanServices {
    pub market_data: Arc<dyn MarketDataSource>,
    pub signals: Arc<dyn SignalStore>,
    pub scan_state: Arc<dyn ScanStateStore>,
    pub risk: Arc<dyn RiskConfigProvider>,
    pub events: broadcast::Sender<EngineEvent>,
}

/// Decides when to scan, walks the symbol lists in priority order and emits at
/// most one signal per scan.
pub struct ScanOrchestrator {
    settings: ScannerSettings,
    forex_indices: Selector,
    crypto: Selector,
    services: ScanServices,
    in_flight: Mutex<()>,
}

impl ScanOrchestrator {
    pub fn new(
        settings: ScannerSettings,
        forex_indices: Selector,
        crypto: Selector,
        services: ScanServices,
    ) -> Self {
        Self {
            settings,
            forex_indices,
            crypto,
            services,
            in_flight: Mutex::new(()),
        }
    }

    /// Builds the orchestrator with the configured strategy sets.
    pub fn from_config(config: &Config, services: ScanServices) -> Result<Self, EngineError> {
        let forex_indices = Selector::new(strategies::forex_indices_strategies(config)?);
        let crypto = Selector::new(strategies::crypto_strategies(config)?);
        Ok(Self::new(config.scanner.clone(), forex_indices, crypto, services))
    }

    /// Scans if the schedule says so.
    pub async fn tick(&self, now: DateTime<Utc>) -> ScanOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return ScanOutcome::Busy;
        };
        let state = self.load_state().await;
        if now < state.next_scan_at {
            return ScanOutcome::NotDue {
                next_scan_at: state.next_scan_at,
            };
        }
        self.scan_locked(now, state).await
    }

    /// Scans regardless of the schedule. Still refuses to overlap another scan.
    pub async fn scan(&self, now: DateTime<Utc>) -> ScanOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return ScanOutcome::Busy;
        };
        let state = self.load_state().await;
        self.scan_locked(now, state).await
    }

    async fn load_state(&self) -> ScanState {
        match self.services.scan_state.load_scan_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load scan state, treating scan as due.");
                ScanState::default()
            }
        }
    }

    async fn scan_locked(&self, now: DateTime<Utc>, mut state: ScanState) -> ScanOutcome {
        tracing::info!("Starting scan...");
        let outcome = self.run_scan(now).await;

        let backoff = match &outcome {
            ScanOutcome::Emitted { signal, .. } => {
                state.last_generated_at = Some(now);
                state.last_id = Some(signal.id.clone());
                self.settings.emitted_backoff_secs
            }
            ScanOutcome::LimitReached { .. } => self.settings.limit_backoff_secs,
            _ => self.settings.no_signal_backoff_secs,
        };
        state.next_scan_at = next_scan_after(now, backoff);

        if let Err(e) = self.services.scan_state.save_scan_state(&state).await {
            tracing::error!(error = %e, "Failed to persist scan state.");
        }
        tracing::info!(next_scan_at = %state.next_scan_at, "Scan finished.");
        outcome
    }

    async fn run_scan(&self, now: DateTime<Utc>) -> ScanOutcome {
        // --- 1. Risk policy, read once per scan ---
        // providers may hit the filesystem
        let provider = Arc::clone(&self.services.risk);
        let risk_config = match tokio::task::spawn_blocking(move || provider.risk_config()).await {
            Ok(Ok(config)) => config,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Risk configuration unavailable, skipping scan.");
                return ScanOutcome::NoSignal;
            }
            Err(e) => {
                tracing::error!(error = %e, "Risk configuration task failed, skipping scan.");
                return ScanOutcome::NoSignal;
            }
        };
        let evaluator = match RiskEvaluator::from_config(&risk_config) {
            Ok(evaluator) => evaluator,
            Err(e) => {
                tracing::error!(error = %e, "Invalid risk configuration, skipping scan.");
                return ScanOutcome::NoSignal;
            }
        };

        // --- 2. Daily budget ---
        let today = match self.services.signals.list_signals().await {
            Ok(signals) => signals
                .iter()
                .filter(|s| s.created_at.date_naive() == now.date_naive())
                .count(),
            Err(e) => {
                tracing::error!(error = %e, "Could not count today's signals, skipping scan.");
                return ScanOutcome::NoSignal;
            }
        };
        tracing::info!(today, limit = risk_config.daily_limit, "Today's signal count.");
        if today >= risk_config.daily_limit as usize {
            tracing::info!("Daily limit reached.");
            return ScanOutcome::LimitReached {
                today,
                limit: risk_config.daily_limit,
            };
        }

        // --- 3. Symbols in priority order, first approved selection wins ---
        let markets = [
            (Market::Forex, &self.settings.forex),
            (Market::Indices, &self.settings.indices),
            (Market::Crypto, &self.settings.crypto),
        ];
        for (market, symbols) in markets {
            for symbol in symbols {
                if let Some(selection) = self.scan_symbol(market, symbol, &evaluator).await {
                    return self.emit(now, market, symbol, selection).await;
                }
            }
        }

        tracing::info!("No signal found.");
        ScanOutcome::NoSignal
    }

    async fn scan_symbol(
        &self,
        market: Market,
        symbol: &str,
        evaluator: &RiskEvaluator,
    ) -> Option<Selection> {
        let (working, higher, selector) = match market {
            Market::Crypto => (
                &self.settings.crypto_working_interval,
                &self.settings.crypto_higher_interval,
                &self.crypto,
            ),
            Market::Forex | Market::Indices => (
                &self.settings.working_interval,
                &self.settings.higher_interval,
                &self.forex_indices,
            ),
        };
        let limit = self.settings.candle_limit as usize;
        tracing::debug!(%market, symbol, "Scanning symbol.");

        let candles = match self.services.market_data.fetch_candles(symbol, working, limit).await {
            Ok(candles) => candles,
            Err(e) => {
                tracing::warn!(%market, symbol, interval = %working, error = %e, "Skipping symbol, candles unavailable.");
                return None;
            }
        };
        let higher_timeframe = match self
            .services
            .market_data
            .fetch_candles(symbol, higher, limit)
            .await
        {
            Ok(candles) => candles,
            Err(e) if market == Market::Crypto => {
                tracing::warn!(%market, symbol, interval = %higher, error = %e, "Skipping symbol, higher timeframe unavailable.");
                return None;
            }
            Err(e) => {
                tracing::warn!(%market, symbol, interval = %higher, error = %e, "Higher timeframe unavailable, continuing without it.");
                Vec::new()
            }
        };

        let ctx = StrategyContext::new(symbol, &higher_timeframe);
        selector.select(&candles, &ctx, evaluator)
    }

    async fn emit(
        &self,
        now: DateTime<Utc>,
        market: Market,
        symbol: &str,
        selection: Selection,
    ) -> ScanOutcome {
        let ttl = signal_ttl(now, self.settings.signal_ttl_hours);
        let signal = Signal::from_candidate(&selection.candidate, market, symbol, now, ttl);

        if let Err(e) = self.services.signals.insert_signal(&signal).await {
            tracing::error!(id = %signal.id, symbol, error = %e, "Failed to persist signal, dropping it.");
            let _ = self.services.events.send(EngineEvent::Log(LogMessage::new(
                LogLevel::Error,
                format!("Signal for {symbol} could not be stored: {e}"),
            )));
            return ScanOutcome::NoSignal;
        }

        tracing::info!(
            id = %signal.id,
            %market,
            symbol,
            strategy = %selection.strategy,
            direction = %signal.direction,
            entry = signal.entry,
            stop_loss = signal.stop_loss,
            reward_risk = selection.reward_risk,
            confluence = selection.confluence,
            "New signal generated."
        );
        // nobody listening is fine
        let _ = self.services.events.send(EngineEvent::SignalCreated(signal.clone()));

        ScanOutcome::Emitted {
            signal,
            strategy: selection.strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn delays_that_cannot_be_added_fall_back() {
        assert_eq!(next_scan_after(now(), 3600), now() + Duration::hours(1));
        assert_eq!(next_scan_after(now(), -1), now() + Duration::minutes(5));
        assert_eq!(next_scan_after(now(), i64::MAX), now() + Duration::minutes(5));

        assert_eq!(signal_ttl(now(), 48), Duration::hours(48));
        assert_eq!(signal_ttl(now(), 0), Duration::hours(24));
        assert_eq!(signal_ttl(now(), i64::MAX), Duration::hours(24));
        assert_eq!(signal_ttl(now(), 2_400_000_000), Duration::hours(24));
    }
}
