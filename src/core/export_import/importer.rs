//! Export-file importer
//!
//! Decodes a peer server's export keys into [`Exposure`] records under a
//! per-peer import policy: which report types are accepted, what to use
//! when the peer omits one, and whether missing symptom-onset deltas are
//! backfilled.

use chrono::{DateTime, Utc};

use crate::core::export_import::proto::{
    TekReportType, TemporaryExposureKey, TemporaryExposureKeyExport,
};
use crate::domain::errors::BeaconError;
use crate::domain::exposure::{Exposure, KEY_LENGTH};
use crate::domain::interval::{MAX_INTERVAL_COUNT, MIN_INTERVAL_COUNT};
use crate::domain::report::{
    effective_transmission_risk, ReportType, MAX_TRANSMISSION_RISK, MIN_TRANSMISSION_RISK,
};
use crate::domain::result::Result;

/// Per-peer import policy
#[derive(Debug, Clone)]
pub struct ExportImportConfig {
    /// Provenance tag stamped on every imported exposure
    pub export_import_id: i64,

    /// Report type used when the export carries `UNKNOWN`
    pub default_report_type: ReportType,

    /// Whether to backfill a missing symptom-onset delta
    pub backfill_symptom_onset: bool,

    /// Value used when backfilling the onset delta
    pub backfill_symptom_onset_value: i32,

    /// Largest absolute onset delta accepted from the peer
    pub max_symptom_onset_days: i32,

    /// Whether clinical/self-report keys are accepted
    pub allow_clinical: bool,

    /// Whether revoked keys are accepted
    pub allow_revoked: bool,
}

/// Converts one export-file key into an [`Exposure`].
///
/// The returned exposure is marked non-local with the configured
/// `export_import_id` provenance tag and `received_at` as its creation
/// time.
///
/// # Errors
///
/// Returns an export-import error when the key violates the wire contract
/// or the peer policy; the caller decides whether to skip the key or fail
/// the file.
pub fn from_export_key(
    key: &TemporaryExposureKey,
    config: &ExportImportConfig,
    received_at: DateTime<Utc>,
) -> Result<Exposure> {
    let key_data = key.key_data.clone().unwrap_or_default();
    if key_data.len() != KEY_LENGTH {
        return Err(BeaconError::ExportImport(format!(
            "invalid key length: {}, must be {}",
            key_data.len(),
            KEY_LENGTH
        )));
    }

    if let Some(risk) = key.transmission_risk_level {
        if risk < MIN_TRANSMISSION_RISK {
            return Err(BeaconError::ExportImport(format!(
                "transmission risk too low: {risk}"
            )));
        }
        if risk > MAX_TRANSMISSION_RISK {
            return Err(BeaconError::ExportImport(format!(
                "transmission risk too high: {risk}"
            )));
        }
    }

    let interval_number = key.rolling_start_interval_number.ok_or_else(|| {
        BeaconError::ExportImport("missing rolling_start_interval_number".to_string())
    })?;

    let rolling_period = key.rolling_period.unwrap_or(MAX_INTERVAL_COUNT);
    if rolling_period < MIN_INTERVAL_COUNT {
        return Err(BeaconError::ExportImport(format!(
            "rolling period too low: {rolling_period}"
        )));
    }
    if rolling_period > MAX_INTERVAL_COUNT {
        return Err(BeaconError::ExportImport(format!(
            "rolling period too high: {rolling_period}"
        )));
    }

    let raw_report_type = key.report_type.unwrap_or(TekReportType::Unknown as i32);
    let report_type = match TekReportType::try_from(raw_report_type) {
        Ok(TekReportType::Unknown) => config.default_report_type,
        Ok(TekReportType::ConfirmedTest) => ReportType::Confirmed,
        Ok(TekReportType::ConfirmedClinicalDiagnosis) | Ok(TekReportType::SelfReport) => {
            if !config.allow_clinical {
                return Err(BeaconError::ExportImport(
                    "saw likely key when not allowed".to_string(),
                ));
            }
            ReportType::Likely
        }
        Ok(TekReportType::Revoked) => {
            if !config.allow_revoked {
                return Err(BeaconError::ExportImport(
                    "saw revoked key when not allowed".to_string(),
                ));
            }
            ReportType::Revoked
        }
        Ok(TekReportType::Recursive) | Err(_) => {
            return Err(BeaconError::ExportImport(format!(
                "unsupported report type: {raw_report_type}"
            )));
        }
    };

    let days_since_symptom_onset = match key.days_since_onset_of_symptoms {
        Some(days) => {
            if days.abs() > config.max_symptom_onset_days {
                return Err(BeaconError::ExportImport(format!(
                    "days since onset of symptoms is out of range: {days}"
                )));
            }
            Some(days)
        }
        None => config
            .backfill_symptom_onset
            .then_some(config.backfill_symptom_onset_value),
    };

    Ok(Exposure {
        exposure_key: key_data,
        transmission_risk: effective_transmission_risk(
            report_type,
            key.transmission_risk_level.unwrap_or(0),
        ),
        interval_number,
        interval_count: rolling_period,
        created_at: received_at,
        local_provenance: false,
        export_import_id: Some(config.export_import_id),
        report_type,
        days_since_symptom_onset,
        ..Exposure::default()
    })
}

/// Converts every key (new and revised) of a decoded export batch.
///
/// Keys violating the contract or the peer policy are skipped; each skip
/// is reported as a per-key error string alongside the converted
/// exposures.
pub fn exposures_from_export(
    export: &TemporaryExposureKeyExport,
    config: &ExportImportConfig,
    received_at: DateTime<Utc>,
) -> (Vec<Exposure>, Vec<String>) {
    let mut exposures = Vec::with_capacity(export.keys.len() + export.revised_keys.len());
    let mut errors = Vec::new();

    for (i, key) in export.keys.iter().chain(export.revised_keys.iter()).enumerate() {
        match from_export_key(key, config, received_at) {
            Ok(exposure) => exposures.push(exposure),
            Err(e) => {
                tracing::warn!(key_index = i, error = %e, "skipping export key");
                errors.push(format!("key {i}: {e}"));
            }
        }
    }

    (exposures, errors)
}
