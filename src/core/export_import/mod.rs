//! Import of peer export files
//!
//! Decodes signed export batches from peer federation servers into
//! exposure records under a per-peer policy. Signature verification and
//! zip packaging live outside this crate; this module consumes the inner
//! binary payload.

pub mod importer;
pub mod proto;

pub use importer::{exposures_from_export, from_export_key, ExportImportConfig};
pub use proto::{
    decode_export_payload, TekReportType, TemporaryExposureKey, TemporaryExposureKeyExport,
    EXPORT_BINARY_HEADER,
};
