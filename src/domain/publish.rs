//! Publish request wire types and verified claims
//!
//! These are the semantic inputs of the publish pipeline: a batch of keys
//! submitted by one device, plus the claims an upstream verifier extracted
//! from the accompanying verification certificate. JWT verification itself
//! happens outside this crate; the claims arrive here already checked.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::{DecodeError, Engine as _};
use serde::{Deserialize, Serialize};

use crate::domain::report::ReportType;

/// One uploaded temporary exposure key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishExposureKey {
    /// Key bytes in base64 (standard or raw-standard alphabet)
    pub key: String,

    /// First interval of the key's validity range
    #[serde(default)]
    pub interval_number: i32,

    /// Number of intervals the key covers
    #[serde(default)]
    pub interval_count: i32,

    /// Device-computed transmission risk, 0 when not provided
    #[serde(default)]
    pub transmission_risk: i32,
}

/// A publish request: a batch of keys submitted by one user/device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publish {
    /// The uploaded keys
    #[serde(default)]
    pub keys: Vec<PublishExposureKey>,

    /// Identifier of the health authority application
    #[serde(default, rename = "healthAuthorityID")]
    pub health_authority_id: String,

    /// User-reported symptom onset interval, 0 when not provided
    #[serde(default)]
    pub symptom_onset_interval: i32,

    /// Region tags requested by the client, when self-reported
    #[serde(default)]
    pub regions: Vec<String>,

    /// Opaque verification certificate, consumed upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_payload: Option<String>,

    /// HMAC key used by the upstream verifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_key: Option<String>,

    /// Request padding, ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

/// Claims extracted from a verified health-authority certificate
///
/// Produced by JWT verification upstream, consumed by the publish
/// transformer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Verified health authority id, 0 when unknown
    pub health_authority_id: i64,

    /// Verified diagnosis report type
    pub report_type: ReportType,

    /// Verified symptom onset interval, 0 when not attested
    pub symptom_onset_interval: u32,
}

/// Decodes an uploaded key accepting both the standard and raw-standard
/// (unpadded) base64 alphabets.
pub fn decode_exposure_key(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    match STANDARD.decode(encoded) {
        Ok(decoded) => Ok(decoded),
        Err(_) => STANDARD_NO_PAD.decode(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_both_encodings() {
        let data = b"this is some data";
        let padded = STANDARD.encode(data);
        let raw = STANDARD_NO_PAD.encode(data);

        assert_eq!(decode_exposure_key(&padded).unwrap(), data);
        assert_eq!(decode_exposure_key(&raw).unwrap(), data);
    }

    #[test]
    fn test_decode_invalid_base64() {
        // A trailing character after padding is invalid in both alphabets.
        let bad = format!("{}2", STANDARD.encode(b"ABC"));
        assert!(decode_exposure_key(&bad).is_err());
    }

    #[test]
    fn test_publish_deserializes_with_defaults() {
        let publish: Publish = serde_json::from_str(
            r#"{
                "keys": [{"key": "AAAA", "intervalNumber": 1, "intervalCount": 144}],
                "healthAuthorityID": "State Health Dept"
            }"#,
        )
        .unwrap();

        assert_eq!(publish.keys.len(), 1);
        assert_eq!(publish.keys[0].transmission_risk, 0);
        assert_eq!(publish.health_authority_id, "State Health Dept");
        assert_eq!(publish.symptom_onset_interval, 0);
        assert!(publish.verification_payload.is_none());
    }
}
