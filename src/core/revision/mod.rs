//! Revision merge for incoming exposure batches
//!
//! Given the exposures already stored for a set of TEKs and an incoming
//! batch, decides per key between insert, revise and reject. The caller
//! runs this inside one ReadCommitted transaction and persists the
//! returned rows atomically; a revision refusal aborts the whole merge so
//! the transaction rolls back.

use std::collections::HashMap;

use crate::domain::exposure::Exposure;
use crate::domain::result::Result;

/// Merges `incoming` exposures against the `existing` rows keyed by
/// base64 TEK.
///
/// Returns only the rows that must be written: incoming keys with no
/// existing row are inserted as-is, keys whose revision was accepted are
/// returned in revised form, and keys needing no change are omitted.
///
/// # Errors
///
/// Returns the first revision refusal
/// ([`RevisionError`](crate::domain::errors::RevisionError)) encountered;
/// no partial result is produced.
pub fn revise_keys(
    existing: &HashMap<String, Exposure>,
    incoming: Vec<Exposure>,
) -> Result<Vec<Exposure>> {
    let mut output = Vec::with_capacity(incoming.len());
    for exposure in incoming {
        match existing.get(&exposure.exposure_key_base64()) {
            None => output.push(exposure),
            Some(previous) => {
                if let Some(revised) = previous.revise(&exposure)? {
                    output.push(revised);
                }
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{BeaconError, RevisionError};
    use crate::domain::interval::truncate_window;
    use crate::domain::report::ReportType;
    use chrono::{Duration, Utc};

    fn existing_map(exposures: &[Exposure]) -> HashMap<String, Exposure> {
        exposures
            .iter()
            .map(|e| (e.exposure_key_base64(), e.clone()))
            .collect()
    }

    #[test]
    fn test_revise_keys_insert_revise_and_skip() {
        let hour = std::time::Duration::from_secs(3600);
        let created_at = truncate_window(Utc::now() - Duration::hours(2), hour);
        let revised_at = truncate_window(Utc::now(), hour);

        // Existing row not in the revision set.
        let untouched = Exposure::builder().exposure_key(vec![0u8; 16]).build();
        // Existing row that the incoming batch upgrades.
        let upgradable = Exposure::builder()
            .exposure_key(vec![1u8; 16])
            .regions(vec!["US".to_string()])
            .intervals(7, 144)
            .created_at(created_at)
            .local_provenance(true)
            .health_authority_id(2)
            .report_type(ReportType::Likely)
            .build();
        // Existing row re-presented with no change.
        let unchanged = Exposure::builder()
            .exposure_key(vec![3u8; 16])
            .regions(vec!["US".to_string()])
            .intervals(100, 144)
            .created_at(created_at)
            .local_provenance(true)
            .health_authority_id(2)
            .report_type(ReportType::Confirmed)
            .build();

        let upgrade = Exposure::builder()
            .exposure_key(vec![1u8; 16])
            .transmission_risk(2)
            .regions(vec!["US".to_string()])
            .intervals(7, 144)
            .created_at(revised_at)
            .local_provenance(true)
            .health_authority_id(2)
            .report_type(ReportType::Confirmed)
            .build();
        let brand_new = Exposure::builder()
            .exposure_key(vec![2u8; 16])
            .regions(vec!["US".to_string()])
            .intervals(8, 144)
            .created_at(created_at)
            .local_provenance(true)
            .health_authority_id(2)
            .report_type(ReportType::Confirmed)
            .build();

        let existing = existing_map(&[untouched, upgradable.clone(), unchanged.clone()]);
        let incoming = vec![upgrade, brand_new.clone(), unchanged];

        let got = revise_keys(&existing, incoming).unwrap();
        assert_eq!(got.len(), 2);

        // The revised row keeps its original view and appends the upgrade.
        assert_eq!(got[0].exposure_key, vec![1u8; 16]);
        assert_eq!(got[0].report_type, ReportType::Likely);
        assert_eq!(got[0].created_at, created_at);
        assert_eq!(got[0].revised_at, Some(revised_at));
        assert_eq!(got[0].revised_report_type, Some(ReportType::Confirmed));
        assert_eq!(got[0].revised_transmission_risk, Some(2));

        // The brand new key passes through untouched.
        assert_eq!(got[1], brand_new);
    }

    #[test]
    fn test_revise_keys_export_import_mismatch() {
        let existing_row = Exposure::builder()
            .exposure_key(vec![5u8; 16])
            .export_import_id(2)
            .build();
        let incoming_row = Exposure::builder()
            .exposure_key(vec![5u8; 16])
            .export_import_id(4)
            .report_type(ReportType::Confirmed)
            .build();

        let err = revise_keys(&existing_map(&[existing_row]), vec![incoming_row]).unwrap_err();
        assert!(matches!(
            err,
            BeaconError::Revision(RevisionError::NotSameFederationSource)
        ));
    }

    #[test]
    fn test_revise_keys_same_export_import_source() {
        let existing_row = Exposure::builder()
            .exposure_key(vec![5u8; 16])
            .export_import_id(2)
            .report_type(ReportType::Likely)
            .build();
        let incoming_row = Exposure::builder()
            .exposure_key(vec![5u8; 16])
            .export_import_id(2)
            .report_type(ReportType::Confirmed)
            .build();

        let got = revise_keys(&existing_map(&[existing_row]), vec![incoming_row]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].revised_report_type, Some(ReportType::Confirmed));
    }

    #[test]
    fn test_revise_keys_federation_mismatch() {
        let existing_row = Exposure::builder()
            .exposure_key(vec![6u8; 16])
            .federation_query_id("query-a")
            .build();
        let incoming_row = Exposure::builder()
            .exposure_key(vec![6u8; 16])
            .report_type(ReportType::Confirmed)
            .build();

        let err = revise_keys(&existing_map(&[existing_row]), vec![incoming_row]).unwrap_err();
        assert!(matches!(
            err,
            BeaconError::Revision(RevisionError::NotSameFederationSource)
        ));
    }

    #[test]
    fn test_revise_keys_same_federation_source() {
        let existing_row = Exposure::builder()
            .exposure_key(vec![6u8; 16])
            .federation_query_id("query-a")
            .report_type(ReportType::Likely)
            .build();
        let incoming_row = Exposure::builder()
            .exposure_key(vec![6u8; 16])
            .federation_query_id("query-a")
            .report_type(ReportType::Confirmed)
            .build();

        assert!(revise_keys(&existing_map(&[existing_row]), vec![incoming_row]).is_ok());
    }
}
