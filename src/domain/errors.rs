//! Domain error types
//!
//! This module defines the error hierarchy for Beacon. All errors are
//! domain-specific and don't expose third-party types. Validation errors
//! carry the exact message surfaced to the publishing client, including
//! the offending key index and values.

use thiserror::Error;

/// Main Beacon error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Publish batch validation errors (fatal to the batch)
    #[error("{0}")]
    Validation(String),

    /// Revision refusal errors (fatal to the offending key)
    #[error(transparent)]
    Revision(#[from] RevisionError),

    /// Export-file import errors
    #[error("export import error: {0}")]
    ExportImport(String),

    /// Database errors
    #[error("database error: {0}")]
    Database(String),

    /// A named advisory lock is already held by another worker
    #[error("lock {0} is already held")]
    AlreadyLocked(String),

    /// A requested row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Blob storage errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("i/o error: {0}")]
    Io(String),
}

/// Reasons the revision engine refuses to revise an existing exposure
///
/// These surface to the publishing client with the existing row left
/// untouched; the enclosing merge transaction rolls back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevisionError {
    /// Provenance identifiers of existing and incoming keys differ
    #[error("key cannot be revised from a different federation or import source")]
    NotSameFederationSource,

    /// A non-locally published key was presented for revision without
    /// federation or import provenance
    #[error("key with non-local provenance cannot be revised")]
    NonLocalProvenance,

    /// A key can only be revised once
    #[error("key has already been revised and cannot be revised again")]
    KeyAlreadyRevised,

    /// Existing and incoming key bytes do not match
    #[error("attempted to revise a key with a different key")]
    KeyMismatch,

    /// The report-type transition is not in the allowed lattice
    #[error("invalid report type transition: cannot transition from {from:?} to {to:?}")]
    InvalidReportTypeTransition { from: String, to: String },
}

/// Blob storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object does not exist
    #[error("object not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure
    #[error("storage i/o error: {0}")]
    Io(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for BeaconError {
    fn from(err: std::io::Error) -> Self {
        BeaconError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BeaconError {
    fn from(err: serde_json::Error) -> Self {
        BeaconError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BeaconError {
    fn from(err: toml::de::Error) -> Self {
        BeaconError::Configuration(format!("TOML parse error: {err}"))
    }
}
