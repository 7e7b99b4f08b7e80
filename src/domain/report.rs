//! Report types and the transmission-risk policy
//!
//! A health authority's verified diagnosis claim attaches a report type to
//! every key in a publish. The report type drives the effective
//! transmission risk when the client did not provide one, and constrains
//! which later revisions are legal.

use crate::domain::errors::BeaconError;
use crate::domain::result::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transmission risk for keys with no report type and no provided value.
pub const TRANSMISSION_RISK_UNKNOWN: i32 = 0;

/// Transmission risk backfilled for lab-confirmed diagnoses.
pub const TRANSMISSION_RISK_CONFIRMED_STANDARD: i32 = 2;

/// Transmission risk backfilled for clinical (likely) diagnoses.
pub const TRANSMISSION_RISK_CLINICAL: i32 = 4;

/// Transmission risk backfilled for negative test results.
pub const TRANSMISSION_RISK_NEGATIVE: i32 = 6;

/// Lowest acceptable transmission risk on input.
pub const MIN_TRANSMISSION_RISK: i32 = 0;

/// Highest acceptable transmission risk on input.
pub const MAX_TRANSMISSION_RISK: i32 = 8;

/// Diagnosis report type attached to an exposure key
///
/// `Unknown` is the explicit empty/legacy case: keys published before
/// verified claims existed, or without verification, carry it and render
/// as the empty string on the wire and in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// No report type (empty/legacy)
    #[default]
    #[serde(rename = "")]
    Unknown,
    /// Laboratory-confirmed diagnosis
    Confirmed,
    /// Clinical diagnosis or self report
    Likely,
    /// Negative test result
    Negative,
    /// Previously published key that was revoked
    Revoked,
}

impl ReportType {
    /// String form used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Unknown => "",
            ReportType::Confirmed => "confirmed",
            ReportType::Likely => "likely",
            ReportType::Negative => "negative",
            ReportType::Revoked => "revoked",
        }
    }

    /// Parses the stored/wire string form.
    ///
    /// `"clinical"` is accepted as an alias for `likely`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(ReportType::Unknown),
            "confirmed" => Ok(ReportType::Confirmed),
            "likely" | "clinical" => Ok(ReportType::Likely),
            "negative" => Ok(ReportType::Negative),
            "revoked" => Ok(ReportType::Revoked),
            other => Err(BeaconError::Validation(format!(
                "invalid report type: {other:?}"
            ))),
        }
    }

    /// Whether a revision from `self` to `to` is in the allowed lattice.
    ///
    /// Allowed: empty and likely may upgrade to confirmed; negative may be
    /// upgraded to anything. Equal-type revisions are handled by the caller
    /// as no-ops before this check.
    pub fn can_transition_to(self, to: ReportType) -> bool {
        match self {
            ReportType::Negative => true,
            ReportType::Unknown | ReportType::Likely => to == ReportType::Confirmed,
            ReportType::Confirmed | ReportType::Revoked => false,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = BeaconError;

    fn from_str(s: &str) -> Result<Self> {
        ReportType::parse(s)
    }
}

/// Resolves the transmission risk stored for a key.
///
/// A nonzero client-provided value is preserved regardless of the claim;
/// clients may already carry a device-computed value. Only when the
/// provided value is 0 does the verified report type backfill it.
pub fn effective_transmission_risk(report_type: ReportType, provided: i32) -> i32 {
    if provided != 0 {
        return provided;
    }
    match report_type {
        ReportType::Confirmed => TRANSMISSION_RISK_CONFIRMED_STANDARD,
        ReportType::Likely => TRANSMISSION_RISK_CLINICAL,
        ReportType::Negative => TRANSMISSION_RISK_NEGATIVE,
        ReportType::Unknown | ReportType::Revoked => TRANSMISSION_RISK_UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_transmission_risk() {
        let cases = vec![
            ("provided_tr_with_report", ReportType::Likely, 8, 8),
            ("provided_tr_no_report", ReportType::Unknown, 7, 7),
            (
                "positive_report_backfill",
                ReportType::Confirmed,
                0,
                TRANSMISSION_RISK_CONFIRMED_STANDARD,
            ),
            (
                "clinical_report_backfill",
                ReportType::Likely,
                0,
                TRANSMISSION_RISK_CLINICAL,
            ),
            (
                "negative_report_backfill",
                ReportType::Negative,
                0,
                TRANSMISSION_RISK_NEGATIVE,
            ),
            (
                "no_tr_no_report",
                ReportType::Unknown,
                0,
                TRANSMISSION_RISK_UNKNOWN,
            ),
        ];

        for (name, report, provided, want) in cases {
            assert_eq!(
                effective_transmission_risk(report, provided),
                want,
                "case {name} failed"
            );
        }
    }

    #[test]
    fn test_transition_lattice() {
        use ReportType::*;

        // The allowed upgrades.
        assert!(Unknown.can_transition_to(Confirmed));
        assert!(Likely.can_transition_to(Confirmed));
        assert!(Negative.can_transition_to(Confirmed));
        assert!(Negative.can_transition_to(Likely));
        assert!(Negative.can_transition_to(Revoked));

        // Everything else is forbidden.
        assert!(!Confirmed.can_transition_to(Likely));
        assert!(!Confirmed.can_transition_to(Negative));
        assert!(!Confirmed.can_transition_to(Revoked));
        assert!(!Unknown.can_transition_to(Likely));
        assert!(!Unknown.can_transition_to(Negative));
        assert!(!Likely.can_transition_to(Negative));
        assert!(!Likely.can_transition_to(Revoked));
        assert!(!Revoked.can_transition_to(Confirmed));
    }

    #[test]
    fn test_parse_round_trip() {
        for rt in [
            ReportType::Unknown,
            ReportType::Confirmed,
            ReportType::Likely,
            ReportType::Negative,
            ReportType::Revoked,
        ] {
            assert_eq!(ReportType::parse(rt.as_str()).unwrap(), rt);
        }
    }

    #[test]
    fn test_parse_clinical_alias() {
        assert_eq!(ReportType::parse("clinical").unwrap(), ReportType::Likely);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ReportType::parse("positive").is_err());
    }

    #[test]
    fn test_serde_empty_string_for_unknown() {
        let json = serde_json::to_string(&ReportType::Unknown).unwrap();
        assert_eq!(json, "\"\"");
        let back: ReportType = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(back, ReportType::Confirmed);
    }
}
