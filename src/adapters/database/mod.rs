//! Database access layer
//!
//! Pooled PostgreSQL client shared by the store adapters.

pub mod client;

pub use client::{read_committed, Db, LockHandle};
