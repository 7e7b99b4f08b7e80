//! Domain models and types for Beacon.
//!
//! This module contains the core domain models, types, and business rules
//! of the key server: the interval algebra, report types with their
//! transmission-risk policy, the durable [`Exposure`] record and its
//! revision protocol, and the publish wire types.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`](crate::domain::Result),
//! wrapping [`BeaconError`]. Errors are automatically converted using the
//! `?` operator.

pub mod errors;
pub mod exposure;
pub mod interval;
pub mod publish;
pub mod report;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{BeaconError, RevisionError, StorageError};
pub use exposure::{Exposure, ExposureBuilder, KEY_LENGTH};
pub use publish::{Publish, PublishExposureKey, VerifiedClaims};
pub use report::ReportType;
pub use result::Result;
