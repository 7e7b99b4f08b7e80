//! End-to-end tests for the revision engine.

use std::collections::HashMap;

use beacon::core::revision::revise_keys;
use beacon::domain::errors::{BeaconError, RevisionError};
use beacon::domain::interval::truncate_window;
use beacon::domain::report::ReportType;
use beacon::domain::Exposure;
use chrono::{DateTime, Duration, Utc};

fn hour_truncated(offset_hours: i64) -> DateTime<Utc> {
    truncate_window(
        Utc::now() + Duration::hours(offset_hours),
        std::time::Duration::from_secs(3600),
    )
}

fn existing_map(exposures: &[Exposure]) -> HashMap<String, Exposure> {
    exposures
        .iter()
        .map(|e| (e.exposure_key_base64(), e.clone()))
        .collect()
}

#[test]
fn accepted_revision_preserves_the_original_view() {
    let created_at = hour_truncated(-2);
    let revised_at = hour_truncated(0);

    let existing = Exposure::builder()
        .exposure_key(vec![9u8; 16])
        .report_type(ReportType::Likely)
        .transmission_risk(4)
        .regions(vec!["US".to_string(), "CA".to_string()])
        .created_at(created_at)
        .local_provenance(true)
        .build();
    let incoming = Exposure::builder()
        .exposure_key(vec![9u8; 16])
        .report_type(ReportType::Confirmed)
        .transmission_risk(5)
        .regions(vec!["MX".to_string()])
        .created_at(revised_at)
        .local_provenance(true)
        .build();

    let got = revise_keys(&existing_map(&[existing]), vec![incoming]).unwrap();
    assert_eq!(got.len(), 1);

    let revised = &got[0];
    assert_eq!(revised.report_type, ReportType::Likely);
    assert_eq!(revised.transmission_risk, 4);
    assert_eq!(revised.revised_report_type, Some(ReportType::Confirmed));
    assert_eq!(revised.revised_transmission_risk, Some(5));
    assert_eq!(revised.revised_at, Some(revised_at));
    assert_eq!(revised.regions, vec!["US", "CA", "MX"]);
}

#[test]
fn revision_is_monotone() {
    let existing = Exposure::builder()
        .exposure_key(vec![7u8; 16])
        .report_type(ReportType::Likely)
        .local_provenance(true)
        .created_at(hour_truncated(-2))
        .build();
    let incoming = Exposure::builder()
        .exposure_key(vec![7u8; 16])
        .report_type(ReportType::Confirmed)
        .local_provenance(true)
        .created_at(hour_truncated(0))
        .build();

    let revised = existing.revise(&incoming).unwrap().expect("first revision");

    // Re-applying the same incoming mutates nothing.
    assert_eq!(revised.revise(&incoming).unwrap(), None);

    // A different second revision is refused.
    let second = Exposure::builder()
        .exposure_key(vec![7u8; 16])
        .report_type(ReportType::Likely)
        .local_provenance(true)
        .created_at(hour_truncated(1))
        .build();
    assert_eq!(
        revised.revise(&second).unwrap_err(),
        RevisionError::KeyAlreadyRevised
    );
}

#[test]
fn forbidden_transitions_do_not_mutate() {
    use ReportType::*;

    let allowed = [
        (Unknown, Confirmed),
        (Likely, Confirmed),
        (Negative, Unknown),
        (Negative, Confirmed),
        (Negative, Likely),
        (Negative, Revoked),
    ];

    for from in [Unknown, Confirmed, Likely, Negative, Revoked] {
        for to in [Unknown, Confirmed, Likely, Negative, Revoked] {
            if from == to || allowed.contains(&(from, to)) {
                continue;
            }

            let existing = Exposure::builder()
                .exposure_key(vec![1u8; 16])
                .report_type(from)
                .local_provenance(true)
                .build();
            let incoming = Exposure::builder()
                .exposure_key(vec![1u8; 16])
                .report_type(to)
                .local_provenance(true)
                .build();

            let err = existing.revise(&incoming).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!(
                    "invalid report type transition: cannot transition from {:?} to {:?}",
                    from.as_str(),
                    to.as_str()
                )
            );
        }
    }
}

#[test]
fn provenance_isolation_between_local_and_import() {
    // An import-sourced key must not revise a locally published row of
    // identical bytes.
    let local = Exposure::builder()
        .exposure_key(vec![4u8; 16])
        .report_type(ReportType::Likely)
        .local_provenance(true)
        .build();
    let imported = Exposure::builder()
        .exposure_key(vec![4u8; 16])
        .report_type(ReportType::Confirmed)
        .export_import_id(3)
        .build();

    let err = revise_keys(&existing_map(&[local.clone()]), vec![imported]).unwrap_err();
    assert!(matches!(
        err,
        BeaconError::Revision(RevisionError::NotSameFederationSource)
    ));

    // The existing row is unchanged: revise never mutates its input.
    assert_eq!(local.revised_at, None);
    assert_eq!(local.report_type, ReportType::Likely);
}

#[test]
fn provenance_isolation_between_federation_queries() {
    let from_peer_a = Exposure::builder()
        .exposure_key(vec![5u8; 16])
        .report_type(ReportType::Likely)
        .federation_query_id("peer-a")
        .build();
    let from_peer_b = Exposure::builder()
        .exposure_key(vec![5u8; 16])
        .report_type(ReportType::Confirmed)
        .federation_query_id("peer-b")
        .build();

    let err = revise_keys(&existing_map(&[from_peer_a]), vec![from_peer_b]).unwrap_err();
    assert!(matches!(
        err,
        BeaconError::Revision(RevisionError::NotSameFederationSource)
    ));
}

#[test]
fn unknown_keys_insert_even_when_others_revise() {
    let existing = Exposure::builder()
        .exposure_key(vec![1u8; 16])
        .report_type(ReportType::Likely)
        .local_provenance(true)
        .created_at(hour_truncated(-1))
        .build();

    let upgrade = Exposure::builder()
        .exposure_key(vec![1u8; 16])
        .report_type(ReportType::Confirmed)
        .local_provenance(true)
        .created_at(hour_truncated(0))
        .build();
    let fresh = Exposure::builder()
        .exposure_key(vec![2u8; 16])
        .report_type(ReportType::Confirmed)
        .local_provenance(true)
        .created_at(hour_truncated(0))
        .build();

    let got = revise_keys(&existing_map(&[existing]), vec![upgrade, fresh.clone()]).unwrap();
    assert_eq!(got.len(), 2);
    assert!(got[0].has_been_revised());
    assert_eq!(got[1], fresh);
}
