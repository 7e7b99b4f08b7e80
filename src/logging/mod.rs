//! Logging and observability
//!
//! Structured logging via the `tracing` crate: console output always,
//! JSON file output with rotation when enabled in configuration.

pub mod structured;

pub use structured::{init_logging, LoggingGuard};
