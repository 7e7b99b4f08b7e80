//! Business logic for the key server
//!
//! The core modules are pure: they validate, normalize, merge and decode
//! without touching storage. The `adapters` layer wires them to
//! PostgreSQL and blob storage.

pub mod export_import;
pub mod publish;
pub mod revision;
