//! Fixed wire schema for export payloads and detached signatures.
//!
//! Field tags are load-bearing: existing client readers decode these
//! messages bit-for-bit, so the numbering here must never change. Messages
//! are written by hand with `prost` derives instead of being generated,
//! which keeps the crate free of a protoc build step.

use prost::Message;

use crate::model;

/// 16-byte ASCII magic prepended to every export payload: the literal
/// `EK Export v1` right-padded with spaces.
pub const EXPORT_MAGIC: &[u8; 16] = b"EK Export v1    ";

/// Top-level export payload, serialized after [`EXPORT_MAGIC`].
#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKeyExport {
    /// Window start, seconds since the epoch, over the unfiltered batch.
    #[prost(fixed64, optional, tag = "1")]
    pub start_timestamp: Option<u64>,
    /// Window end, seconds since the epoch, over the unfiltered batch.
    #[prost(fixed64, optional, tag = "2")]
    pub end_timestamp: Option<u64>,
    #[prost(string, optional, tag = "3")]
    pub region: Option<String>,
    #[prost(int32, optional, tag = "4")]
    pub batch_num: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    pub batch_size: Option<i32>,
    #[prost(message, repeated, tag = "6")]
    pub signature_infos: Vec<SignatureInfo>,
    #[prost(message, repeated, tag = "7")]
    pub keys: Vec<TemporaryExposureKey>,
}

/// Signature descriptor carried inside both the export payload and the
/// signature list. Tag 2 is reserved (a retired platform-specific field).
#[derive(Clone, PartialEq, Message)]
pub struct SignatureInfo {
    #[prost(string, optional, tag = "1")]
    pub app_bundle_id: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub verification_key_version: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub verification_key_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub signature_algorithm: Option<String>,
}

impl From<&model::SignatureInfo> for SignatureInfo {
    fn from(info: &model::SignatureInfo) -> Self {
        Self {
            app_bundle_id: Some(info.app_bundle_id.clone()),
            verification_key_version: Some(info.verification_key_version.clone()),
            verification_key_id: Some(info.verification_key_id.clone()),
            signature_algorithm: Some(info.signature_algorithm.clone()),
        }
    }
}

/// One exposure key on the wire. `key_data` carries the raw 16 bytes, not
/// the base64 transport form.
#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKey {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_data: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "2")]
    pub transmission_risk_level: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub rolling_start_interval_number: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub rolling_period: Option<i32>,
}

/// Envelope for detached signatures, serialized as `export.sig`.
/// Always carries exactly one entry here; multi-signer support would add
/// more.
#[derive(Clone, PartialEq, Message)]
pub struct TekSignatureList {
    #[prost(message, repeated, tag = "1")]
    pub signatures: Vec<TekSignature>,
}

/// One detached signature over the full export payload (magic included).
#[derive(Clone, PartialEq, Message)]
pub struct TekSignature {
    #[prost(message, optional, tag = "1")]
    pub signature_info: Option<SignatureInfo>,
    #[prost(int32, optional, tag = "2")]
    pub batch_num: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub batch_size: Option<i32>,
    /// DER-encoded ECDSA-P256/SHA-256 signature.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub signature: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_is_sixteen_bytes() {
        assert_eq!(EXPORT_MAGIC.len(), 16);
        assert!(EXPORT_MAGIC.starts_with(b"EK Export v1"));
        assert!(EXPORT_MAGIC[12..].iter().all(|b| *b == b' '));
    }

    #[test]
    fn test_export_roundtrip() {
        let export = TemporaryExposureKeyExport {
            start_timestamp: Some(1_700_000_000),
            end_timestamp: Some(1_700_003_600),
            region: Some("DE".to_string()),
            batch_num: Some(1),
            batch_size: Some(1),
            signature_infos: vec![SignatureInfo {
                app_bundle_id: Some("com.example.app".to_string()),
                verification_key_version: Some("v1".to_string()),
                verification_key_id: Some("310".to_string()),
                signature_algorithm: Some("1.2.840.10045.4.3.2".to_string()),
            }],
            keys: vec![TemporaryExposureKey {
                key_data: Some(vec![0xab; 16]),
                transmission_risk_level: Some(4),
                rolling_start_interval_number: Some(2_650_000),
                rolling_period: Some(144),
            }],
        };

        let bytes = export.encode_to_vec();
        let decoded = TemporaryExposureKeyExport::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, export);
    }

    #[test]
    fn test_signature_info_from_model() {
        let info = model::SignatureInfo {
            app_bundle_id: "com.example.app".to_string(),
            verification_key_version: "v2".to_string(),
            verification_key_id: "244".to_string(),
            signature_algorithm: "1.2.840.10045.4.3.2".to_string(),
        };

        let wire: SignatureInfo = (&info).into();
        assert_eq!(wire.app_bundle_id.as_deref(), Some("com.example.app"));
        assert_eq!(wire.verification_key_version.as_deref(), Some("v2"));
        assert_eq!(wire.verification_key_id.as_deref(), Some("244"));
        assert_eq!(wire.signature_algorithm.as_deref(), Some("1.2.840.10045.4.3.2"));
    }

    #[test]
    fn test_fixed64_window_encoding() {
        // start_timestamp is fixed64, tag 1: wire byte 0x09 then 8 LE bytes.
        let export = TemporaryExposureKeyExport {
            start_timestamp: Some(1),
            ..Default::default()
        };
        let bytes = export.encode_to_vec();
        assert_eq!(bytes[0], 0x09);
        assert_eq!(&bytes[1..9], &[1, 0, 0, 0, 0, 0, 0, 0]);
    }
}
