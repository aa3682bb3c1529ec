use crate::monitor::{MonitorOutcome, SignalMonitor};
use crate::scanner::{ScanOrchestrator, ScanOutcome};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Drives the scan and monitor loops until shutdown.
///
/// Each loop awaits its own work before waiting for the next tick, and missed
/// ticks are skipped, so a slow pass drops ticks instead of queueing them.
pub struct Scheduler {
    scanner: Arc<ScanOrchestrator>,
    monitor: Arc<SignalMonitor>,
    scan_every: Duration,
    monitor_every: Duration,
}

impl Scheduler {
    pub fn new(
        scanner: Arc<ScanOrchestrator>,
        monitor: Arc<SignalMonitor>,
        scan_every: Duration,
        monitor_every: Duration,
    ) -> Self {
        Self {
            scanner,
            monitor,
            scan_every,
            monitor_every,
        }
    }

    /// Runs both loops until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            scan_every_secs = self.scan_every.as_secs(),
            monitor_every_secs = self.monitor_every.as_secs(),
            "Scheduler started."
        );
        let scan_task = tokio::spawn(scan_loop(self.scanner, self.scan_every));
        let monitor_task = tokio::spawn(monitor_loop(self.monitor, self.monitor_every));

        shutdown.await;

        scan_task.abort();
        monitor_task.abort();
        tracing::info!("Scheduler stopped.");
    }
}

async fn scan_loop(scanner: Arc<ScanOrchestrator>, every: Duration) {
    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        // The first tick completes immediately.
        timer.tick().await;
        match scanner.tick(Utc::now()).await {
            ScanOutcome::Busy => tracing::debug!("Scan already in progress, tick dropped."),
            ScanOutcome::NotDue { next_scan_at } => tracing::trace!(%next_scan_at, "Scan not due."),
            outcome => tracing::debug!(?outcome, "Scan tick complete."),
        }
    }
}

async fn monitor_loop(monitor: Arc<SignalMonitor>, every: Duration) {
    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        timer.tick().await;
        match monitor.run_once(Utc::now()).await {
            MonitorOutcome::Busy => tracing::debug!("Monitor pass already in progress, tick dropped."),
            MonitorOutcome::Completed(report) => tracing::debug!(
                checked = report.checked,
                closed = report.closed.len(),
                skipped = report.skipped_symbols.len(),
                "Monitor pass complete."
            ),
        }
    }
}
