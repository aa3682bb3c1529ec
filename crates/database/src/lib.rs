//! # Tradewind Database Crate
//!
//! Durable storage for signals and for the scan orchestrator's scheduling
//! record. It is the system's memory between restarts.
//!
//! ## Architectural Principles
//!
//! - **Stores behind traits:** the engine only sees `SignalStore` and
//!   `ScanStateStore`. Concrete backends are chosen once at startup.
//! - **PostgreSQL first, JSON always:** `PgStore` is the primary backend and
//!   `JsonStore` keeps a file mirror under the data directory. `FallbackStore`
//!   combines them so a database outage degrades to local files instead of
//!   stopping the scanner.
//! - **Atomic resolution:** closing a signal is a conditional update that only
//!   succeeds while the signal is still active, so a signal is resolved once.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: establish the pool and bring the schema up to date.
//! - `PgStore`, `JsonStore`, `FallbackStore`: the store implementations.
//! - `SignalStore`, `ScanStateStore`: the interfaces the engine depends on.
//! - `DbError`: the error type returned by every store.

pub mod connection;
pub mod error;
pub mod fallback;
pub mod json;
pub mod pg;
pub mod store;

pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use fallback::FallbackStore;
pub use json::JsonStore;
pub use pg::PgStore;
pub use store::{ScanStateStore, SignalStore};
