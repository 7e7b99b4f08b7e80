//! Result type alias for Beacon operations
//!
//! All fallible operations in this crate return this alias so callers can
//! use the `?` operator without naming the error type.

use super::errors::BeaconError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, BeaconError>;
