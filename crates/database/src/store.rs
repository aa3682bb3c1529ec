use crate::error::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{ScanState, Signal, SignalResult};

/// Persistence for emitted signals. Signals are never deleted.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// All signals, newest first.
    async fn list_signals(&self) -> Result<Vec<Signal>, DbError>;

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DbError>;

    /// Closes the signal `id` if, and only if, it is still active.
    ///
    /// The check and the write happen atomically, so two resolvers racing on
    /// the same signal cannot both succeed. Returns whether anything changed.
    async fn update_signal_resolution(
        &self,
        id: &str,
        result: SignalResult,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, DbError>;

    async fn list_active_signals(&self) -> Result<Vec<Signal>, DbError> {
        let mut signals = self.list_signals().await?;
        signals.retain(Signal::is_active);
        Ok(signals)
    }
}

/// Persistence for the orchestrator's single scheduling record.
#[async_trait]
pub trait ScanStateStore: Send + Sync {
    /// The stored state, or the default (immediately due) state if none exists.
    async fn load_scan_state(&self) -> Result<ScanState, DbError>;

    async fn save_scan_state(&self, state: &ScanState) -> Result<(), DbError>;
}
