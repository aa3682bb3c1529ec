//! # Tradewind Events
//!
//! This crate defines the events the engine broadcasts to its listeners (the
//! Telegram alerter today, any live-update transport tomorrow).
//!
//! As a Layer 0 crate, it depends only on `core-types` and provides the
//! definitive language for everything the engine announces.

// Declare the modules that make up this crate.
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use messages::{EngineEvent, LogLevel, LogMessage, SignalClosure};
