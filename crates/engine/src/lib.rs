//! # Tradewind Engine
//!
//! The engine turns market data into signals and signals into outcomes. It
//! wires the strategies, the risk gate, market data and the stores together.
//!
//! ## Architectural Principles
//!
//! - **Single flight:** at most one scan runs at a time; a second request
//!   returns `ScanOutcome::Busy` instead of waiting.
//! - **Explicit schedule:** when the next scan is due lives in the stored
//!   `ScanState`, never in process memory.
//! - **Failures become outcomes:** per-symbol fetch errors, strategy errors and
//!   store errors are logged and folded into the outcome. Nothing inside a scan
//!   or a monitor pass propagates them.
//!
//! ## Public API
//!
//! - `Selector` / `Selection`: reconciles strategy candidates and applies the risk gate.
//! - `ScanOrchestrator` / `ScanOutcome`: the scheduled scan state machine.
//! - `SignalMonitor`: resolves active signals against the latest prices.
//! - `Scheduler`: background driver for both loops.

pub mod error;
pub mod monitor;
pub mod scanner;
pub mod scheduler;
pub mod selector;

pub use error::EngineError;
pub use monitor::{resolve, MonitorOutcome, MonitorReport, SignalMonitor};
pub use scanner::{ScanOrchestrator, ScanOutcome, ScanServices};
pub use scheduler::Scheduler;
pub use selector::{Selection, Selector};
