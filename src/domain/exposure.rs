//! The durable exposure record and its revision protocol
//!
//! An [`Exposure`] is the stored form of one temporary exposure key. It is
//! created by the publish transformer or the export-file importer, may be
//! revised exactly once under the report-type lattice, and is immutable
//! afterwards. Revision never mutates in place: [`Exposure::revise`]
//! returns a new value for the persistence layer to write back inside its
//! transaction.

use crate::domain::errors::RevisionError;
use crate::domain::report::{effective_transmission_risk, ReportType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Required length of a temporary exposure key, in bytes.
pub const KEY_LENGTH: usize = 16;

/// Durable record for one temporary exposure key
///
/// Provenance is exactly one of: local (`local_provenance`), a federation
/// query (`federation_query_id`), or an export-file import
/// (`export_import_id`). The `revised_*` fields are set at most once, by
/// an accepted revision, and record the upgraded view without destroying
/// the original one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    /// The 16 opaque key bytes
    pub exposure_key: Vec<u8>,

    /// Effective transmission risk, 0 when unknown
    pub transmission_risk: i32,

    /// Identifier of the publishing health authority application
    pub app_package_name: String,

    /// Upper-cased region tags this key applies to
    pub regions: Vec<String>,

    /// First interval of the key's validity range
    pub interval_number: i32,

    /// Number of intervals the key covers
    pub interval_count: i32,

    /// Batch timestamp, truncated to the configured window
    pub created_at: DateTime<Utc>,

    /// True iff the key was ingested directly from a local publisher
    pub local_provenance: bool,

    /// Federation query this key arrived through, when not local
    pub federation_query_id: Option<String>,

    /// Export-import peer this key arrived through, when not local
    pub export_import_id: Option<i64>,

    /// Verified diagnosis report type
    pub report_type: ReportType,

    /// Verified health authority, when known
    pub health_authority_id: Option<i64>,

    /// Whole days between symptom onset and the key's start interval
    pub days_since_symptom_onset: Option<i32>,

    /// When the accepted revision was applied
    pub revised_at: Option<DateTime<Utc>>,

    /// Report type of the accepted revision
    pub revised_report_type: Option<ReportType>,

    /// Transmission risk of the accepted revision
    pub revised_transmission_risk: Option<i32>,

    /// Onset delta of the accepted revision
    pub revised_days_since_symptom_onset: Option<i32>,
}

impl Exposure {
    /// Returns a builder for constructing an exposure.
    pub fn builder() -> ExposureBuilder {
        ExposureBuilder::default()
    }

    /// The key bytes in standard base64, used to address rows by TEK.
    pub fn exposure_key_base64(&self) -> String {
        STANDARD.encode(&self.exposure_key)
    }

    /// Whether this record has already been revised.
    pub fn has_been_revised(&self) -> bool {
        self.revised_at.is_some()
    }

    /// Decides whether `incoming` revises this record.
    ///
    /// Returns `Ok(None)` when no change is needed (equal report type, or
    /// an idempotent replay of an already-applied revision), and
    /// `Ok(Some(revised))` with the new value to persist when the revision
    /// is accepted. The original `report_type`, `transmission_risk`,
    /// `days_since_symptom_onset` and `created_at` are never changed;
    /// regions are set-unioned so original consumers keep exporting the
    /// key.
    pub fn revise(&self, incoming: &Exposure) -> Result<Option<Exposure>, RevisionError> {
        // A key can only be revised from the exact same source.
        if self.federation_query_id != incoming.federation_query_id
            || self.export_import_id != incoming.export_import_id
        {
            return Err(RevisionError::NotSameFederationSource);
        }

        if self.exposure_key != incoming.exposure_key {
            return Err(RevisionError::KeyMismatch);
        }

        if self.has_been_revised() {
            // Replaying the same revision is a no-op, anything else is
            // a second revision attempt.
            if self.revised_report_type == Some(incoming.report_type) {
                return Ok(None);
            }
            return Err(RevisionError::KeyAlreadyRevised);
        }

        if self.report_type == incoming.report_type {
            return Ok(None);
        }

        if !self.local_provenance
            && incoming.federation_query_id.is_none()
            && incoming.export_import_id.is_none()
        {
            return Err(RevisionError::NonLocalProvenance);
        }

        if !self.report_type.can_transition_to(incoming.report_type) {
            return Err(RevisionError::InvalidReportTypeTransition {
                from: self.report_type.as_str().to_string(),
                to: incoming.report_type.as_str().to_string(),
            });
        }

        if self.report_type == ReportType::Negative {
            tracing::warn!(
                key = %self.exposure_key_base64(),
                to = %incoming.report_type,
                "revising a negative report"
            );
        }

        let mut revised = self.clone();
        revised.revised_at = Some(incoming.created_at);
        revised.revised_report_type = Some(incoming.report_type);
        revised.revised_transmission_risk = Some(effective_transmission_risk(
            incoming.report_type,
            incoming.transmission_risk,
        ));
        revised.revised_days_since_symptom_onset = incoming.days_since_symptom_onset;
        if incoming.health_authority_id.is_some() {
            revised.health_authority_id = incoming.health_authority_id;
        }
        revised.regions = merge_regions(&self.regions, &incoming.regions);
        Ok(Some(revised))
    }
}

impl Default for Exposure {
    fn default() -> Self {
        Self {
            exposure_key: Vec::new(),
            transmission_risk: 0,
            app_package_name: String::new(),
            regions: Vec::new(),
            interval_number: 0,
            interval_count: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            local_provenance: false,
            federation_query_id: None,
            export_import_id: None,
            report_type: ReportType::Unknown,
            health_authority_id: None,
            days_since_symptom_onset: None,
            revised_at: None,
            revised_report_type: None,
            revised_transmission_risk: None,
            revised_days_since_symptom_onset: None,
        }
    }
}

/// Set-union of region lists with stable order: existing regions first,
/// then incoming ones not already present, in their incoming order.
pub fn merge_regions(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = existing.to_vec();
    for region in incoming {
        if !merged.iter().any(|r| r == region) {
            merged.push(region.clone());
        }
    }
    merged
}

/// Builder for constructing [`Exposure`] instances
#[derive(Debug, Default)]
pub struct ExposureBuilder {
    exposure: Exposure,
}

impl ExposureBuilder {
    /// Creates a new builder with all fields at their defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key bytes.
    pub fn exposure_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.exposure.exposure_key = key.into();
        self
    }

    /// Sets the transmission risk.
    pub fn transmission_risk(mut self, risk: i32) -> Self {
        self.exposure.transmission_risk = risk;
        self
    }

    /// Sets the publishing application name.
    pub fn app_package_name(mut self, name: impl Into<String>) -> Self {
        self.exposure.app_package_name = name.into();
        self
    }

    /// Sets the region tags.
    pub fn regions(mut self, regions: Vec<String>) -> Self {
        self.exposure.regions = regions;
        self
    }

    /// Sets the validity range.
    pub fn intervals(mut self, number: i32, count: i32) -> Self {
        self.exposure.interval_number = number;
        self.exposure.interval_count = count;
        self
    }

    /// Sets the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.exposure.created_at = created_at;
        self
    }

    /// Marks the key as locally published.
    pub fn local_provenance(mut self, local: bool) -> Self {
        self.exposure.local_provenance = local;
        self
    }

    /// Sets the federation query provenance tag.
    pub fn federation_query_id(mut self, id: impl Into<String>) -> Self {
        self.exposure.federation_query_id = Some(id.into());
        self
    }

    /// Sets the export-import provenance tag.
    pub fn export_import_id(mut self, id: i64) -> Self {
        self.exposure.export_import_id = Some(id);
        self
    }

    /// Sets the report type.
    pub fn report_type(mut self, report_type: ReportType) -> Self {
        self.exposure.report_type = report_type;
        self
    }

    /// Sets the health authority id.
    pub fn health_authority_id(mut self, id: i64) -> Self {
        self.exposure.health_authority_id = Some(id);
        self
    }

    /// Sets the symptom-onset delta.
    pub fn days_since_symptom_onset(mut self, days: i32) -> Self {
        self.exposure.days_since_symptom_onset = Some(days);
        self
    }

    /// Sets the revision timestamp.
    pub fn revised_at(mut self, at: DateTime<Utc>) -> Self {
        self.exposure.revised_at = Some(at);
        self
    }

    /// Sets the revised report type.
    pub fn revised_report_type(mut self, report_type: ReportType) -> Self {
        self.exposure.revised_report_type = Some(report_type);
        self
    }

    /// Builds the exposure.
    pub fn build(self) -> Exposure {
        self.exposure
    }
}
