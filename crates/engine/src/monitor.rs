use api_client::MarketDataSource;
use chrono::{DateTime, Utc};
use configuration::MonitorSettings;
use core_types::{Direction, Signal, SignalResult};
use database::SignalStore;
use events::{EngineEvent, SignalClosure};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Decides whether `price` settles `signal`. The stop is checked first, so a
/// price that somehow satisfies both counts as a loss.
pub fn resolve(signal: &Signal, price: f64) -> Option<SignalResult> {
    let target = signal.take_profit.first();
    match signal.direction {
        Direction::Buy if price <= signal.stop_loss => Some(SignalResult::Loss),
        Direction::Buy if price >= target => Some(SignalResult::Win),
        Direction::Sell if price >= signal.stop_loss => Some(SignalResult::Loss),
        Direction::Sell if price <= target => Some(SignalResult::Win),
        _ => None,
    }
}

/// Result of one monitor pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    /// Active signals looked at.
    pub checked: usize,
    /// Symbols whose price could not be read.
    pub skipped_symbols: Vec<String>,
    pub closed: Vec<SignalClosure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    /// A pass was already running.
    Busy,
    Completed(MonitorReport),
}

/// Resolves active signals against the latest prices.
pub struct SignalMonitor {
    market_data: Arc<dyn MarketDataSource>,
    signals: Arc<dyn SignalStore>,
    events: broadcast::Sender<EngineEvent>,
    settings: MonitorSettings,
    in_flight: Mutex<()>,
}

impl SignalMonitor {
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        signals: Arc<dyn SignalStore>,
        events: broadcast::Sender<EngineEvent>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            market_data,
            signals,
            events,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> MonitorOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return MonitorOutcome::Busy;
        };

        let active = match self.signals.list_active_signals().await {
            Ok(active) => active,
            Err(e) => {
                tracing::error!(error = %e, "Could not list active signals.");
                return MonitorOutcome::Completed(MonitorReport::default());
            }
        };
        let mut report = MonitorReport {
            checked: active.len(),
            ..MonitorReport::default()
        };
        if active.is_empty() {
            return MonitorOutcome::Completed(report);
        }

        // One price per distinct symbol, fetched concurrently.
        let symbols: BTreeSet<&str> = active.iter().map(|s| s.symbol.as_str()).collect();
        let fetches = symbols.into_iter().map(|symbol| async move {
            (symbol, self.market_data.latest_price(symbol).await)
        });
        let mut prices: HashMap<&str, f64> = HashMap::new();
        for (symbol, result) in join_all(fetches).await {
            match result {
                Ok(price) => {
                    prices.insert(symbol, price);
                }
                Err(e) => {
                    tracing::warn!(symbol, error = %e, "Price unavailable, skipping symbol.");
                    report.skipped_symbols.push(symbol.to_string());
                }
            }
        }

        for signal in &active {
            let Some(&price) = prices.get(signal.symbol.as_str()) else {
                continue;
            };
            let result = resolve(signal, price).or_else(|| {
                let expired = self.settings.expire_signals && now >= signal.expires_at;
                expired.then_some(SignalResult::Expired)
            });
            let Some(result) = result else {
                continue;
            };

            match self.signals.update_signal_resolution(&signal.id, result, now).await {
                Ok(true) => {
                    tracing::info!(id = %signal.id, symbol = %signal.symbol, %result, price, "Signal closed.");
                    let closure = SignalClosure {
                        id: signal.id.clone(),
                        symbol: signal.symbol.clone(),
                        direction: signal.direction,
                        result,
                        price: Some(price),
                        closed_at: now,
                    };
                    let _ = self.events.send(EngineEvent::SignalClosed(closure.clone()));
                    report.closed.push(closure);
                }
                Ok(false) => {
                    tracing::debug!(id = %signal.id, "Signal already closed elsewhere.");
                }
                Err(e) => {
                    tracing::error!(id = %signal.id, error = %e, "Failed to store signal resolution.");
                }
            }
        }

        MonitorOutcome::Completed(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_types::{Market, StrategyCandidate, TakeProfit};

    fn signal(direction: Direction, entry: f64, stop: f64, tp: f64) -> Signal {
        let candidate = StrategyCandidate {
            direction,
            entry,
            stop_loss: stop,
            take_profit: TakeProfit::Single(tp),
            confidence: 0.7,
            reason: "test".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Signal::from_candidate(&candidate, Market::Forex, "EURUSD", now, Duration::hours(24))
    }

    #[test]
    fn buy_resolution() {
        let s = signal(Direction::Buy, 1.1, 1.0, 1.2);
        assert_eq!(resolve(&s, 0.99), Some(SignalResult::Loss));
        assert_eq!(resolve(&s, 1.0), Some(SignalResult::Loss));
        assert_eq!(resolve(&s, 1.21), Some(SignalResult::Win));
        assert_eq!(resolve(&s, 1.15), None);
    }

    #[test]
    fn sell_resolution() {
        let s = signal(Direction::Sell, 1.1, 1.2, 1.0);
        assert_eq!(resolve(&s, 1.21), Some(SignalResult::Loss));
        assert_eq!(resolve(&s, 0.99), Some(SignalResult::Win));
        assert_eq!(resolve(&s, 1.1), None);
    }

    #[test]
    fn ladder_uses_first_target() {
        let mut s = signal(Direction::Buy, 1.1, 1.0, 1.2);
        s.take_profit = TakeProfit::ladder(vec![1.15, 1.3]).unwrap();
        assert_eq!(resolve(&s, 1.16), Some(SignalResult::Win));
    }
}
