//! Peer export wire format
//!
//! Hand-written prost messages for the interoperable export file format.
//! Only the fields this server consumes are modeled; unknown fields
//! (signature blocks and future additions) are skipped by the decoder.

use prost::Message;

use crate::domain::errors::BeaconError;
use crate::domain::result::Result;

/// Fixed header preceding the serialized export message in a payload.
pub const EXPORT_BINARY_HEADER: &[u8; 16] = b"EK Export v1    ";

/// Report type attached to a key in a peer export file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TekReportType {
    /// No report type in the export
    Unknown = 0,
    /// Laboratory-confirmed test
    ConfirmedTest = 1,
    /// Clinical diagnosis
    ConfirmedClinicalDiagnosis = 2,
    /// Self-reported diagnosis
    SelfReport = 3,
    /// Derived from proximity to another case; not supported here
    Recursive = 4,
    /// Key revoked after publication
    Revoked = 5,
}

/// One temporary exposure key as carried in a peer export file.
#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKey {
    /// The 16 key bytes
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_data: Option<Vec<u8>>,

    /// Transmission risk assigned by the origin server
    #[prost(int32, optional, tag = "2")]
    pub transmission_risk_level: Option<i32>,

    /// First interval of the key's validity range
    #[prost(int32, optional, tag = "3")]
    pub rolling_start_interval_number: Option<i32>,

    /// Number of intervals covered; 144 when absent
    #[prost(int32, optional, tag = "4")]
    pub rolling_period: Option<i32>,

    /// Diagnosis report type
    #[prost(enumeration = "TekReportType", optional, tag = "5")]
    pub report_type: Option<i32>,

    /// Signed day delta between symptom onset and the key start
    #[prost(sint32, optional, tag = "6")]
    pub days_since_onset_of_symptoms: Option<i32>,
}

/// A peer server's export batch.
#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKeyExport {
    /// Start of the window the batch covers, UNIX seconds
    #[prost(fixed64, optional, tag = "1")]
    pub start_timestamp: Option<u64>,

    /// End of the window the batch covers, UNIX seconds
    #[prost(fixed64, optional, tag = "2")]
    pub end_timestamp: Option<u64>,

    /// Region the batch was produced for
    #[prost(string, optional, tag = "3")]
    pub region: Option<String>,

    /// Position of this file within the batch
    #[prost(int32, optional, tag = "4")]
    pub batch_num: Option<i32>,

    /// Number of files in the batch
    #[prost(int32, optional, tag = "5")]
    pub batch_size: Option<i32>,

    // Tag 6 carries signature_infos; signature verification is out of
    // scope and the field is left unmodeled.
    /// Newly published keys
    #[prost(message, repeated, tag = "7")]
    pub keys: Vec<TemporaryExposureKey>,

    /// Keys revised since their original publication
    #[prost(message, repeated, tag = "8")]
    pub revised_keys: Vec<TemporaryExposureKey>,
}

/// Decodes an export payload: the fixed 16-byte header followed by the
/// serialized [`TemporaryExposureKeyExport`] message.
pub fn decode_export_payload(payload: &[u8]) -> Result<TemporaryExposureKeyExport> {
    let Some(body) = payload.strip_prefix(EXPORT_BINARY_HEADER.as_slice()) else {
        return Err(BeaconError::ExportImport(
            "export payload is missing the EK Export v1 header".to_string(),
        ));
    };
    TemporaryExposureKeyExport::decode(body)
        .map_err(|e| BeaconError::ExportImport(format!("decoding export payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_sixteen_bytes() {
        assert_eq!(EXPORT_BINARY_HEADER.len(), 16);
        assert!(EXPORT_BINARY_HEADER.starts_with(b"EK Export v1"));
    }

    #[test]
    fn test_payload_round_trip() {
        let export = TemporaryExposureKeyExport {
            start_timestamp: Some(1_583_020_800),
            end_timestamp: Some(1_583_107_200),
            region: Some("US".to_string()),
            batch_num: Some(1),
            batch_size: Some(1),
            keys: vec![TemporaryExposureKey {
                key_data: Some(vec![1u8; 16]),
                transmission_risk_level: Some(2),
                rolling_start_interval_number: Some(2_636_928),
                rolling_period: Some(144),
                report_type: Some(TekReportType::ConfirmedTest as i32),
                days_since_onset_of_symptoms: Some(-2),
            }],
            revised_keys: vec![],
        };

        let mut payload = EXPORT_BINARY_HEADER.to_vec();
        payload.extend(export.encode_to_vec());

        let decoded = decode_export_payload(&payload).unwrap();
        assert_eq!(decoded, export);
    }

    #[test]
    fn test_payload_without_header() {
        let err = decode_export_payload(b"not an export").unwrap_err();
        assert!(err.to_string().contains("EK Export v1"));
    }

    #[test]
    fn test_negative_onset_survives_sint32_encoding() {
        let key = TemporaryExposureKey {
            days_since_onset_of_symptoms: Some(-14),
            ..Default::default()
        };
        let decoded = TemporaryExposureKey::decode(key.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.days_since_onset_of_symptoms, Some(-14));
    }
}
