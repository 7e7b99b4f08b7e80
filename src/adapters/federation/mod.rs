//! Federation-in ledger
//!
//! Durable per-peer bookmarks and sync history, serialized by named
//! advisory locks so at most one worker syncs a given query at a time.

pub mod model;
pub mod store;

pub use model::{FederationInQuery, FederationInSync, FetchCursor, FetchState};
pub use store::{FederationInStore, SyncHandle};
