//! Data model for key records, region batches, and bundle metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded exposure keys must be exactly this many bytes.
pub const KEY_LENGTH: usize = 16;

/// Key records and the bundles covering them are retired after this many days.
pub const RETENTION_DAYS: i64 = 14;

/// How many preceding midnights an export pass re-derives.
pub const BACKFILL_DAYS: u32 = 14;

/// One observed exposure key, as stored by the ingestion path.
///
/// Read-only to this crate; only the retention sweeper deletes them.
/// `key_data` is base64 (standard alphabet) over exactly [`KEY_LENGTH`] raw
/// bytes — records that decode to any other length are excluded from export
/// but left in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    /// Monotonically increasing identifier, used as the incremental-export
    /// watermark.
    pub id: i64,
    /// Ingestion time; drives export windows and retention age.
    pub created_at: DateTime<Utc>,
    /// Base64-carried raw key bytes.
    pub key_data: String,
    pub rolling_start_interval_number: i32,
    pub rolling_period: i32,
    pub transmission_risk_level: i32,
    /// Region codes this key must be distributed to. Never empty.
    pub regions: Vec<String>,
}

impl KeyRecord {
    /// The record as it travels inside a region batch, without `regions`.
    pub fn to_export_key(&self) -> ExportKey {
        ExportKey {
            created_at: self.created_at,
            key_data: self.key_data.clone(),
            rolling_start_interval_number: self.rolling_start_interval_number,
            rolling_period: self.rolling_period,
            transmission_risk_level: self.transmission_risk_level,
        }
    }
}

/// A [`KeyRecord`] minus its `regions` field, fanned out into one or more
/// region batches by the partitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportKey {
    pub created_at: DateTime<Utc>,
    pub key_data: String,
    pub rolling_start_interval_number: i32,
    pub rolling_period: i32,
    pub transmission_risk_level: i32,
}

/// One row per generated archive.
///
/// At most one row may exist per `(since_exposure_id, last_exposure_id,
/// region)` triple — that triple is the idempotence key which makes retried
/// invocations safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Object-store key, `exposures/{region lowercased}/{epoch_millis}.zip`.
    pub path: String,
    /// Records covered by this bundle's range, counted before key-length
    /// filtering.
    pub exposure_count: i64,
    /// Exclusive lower bound of the covered id range.
    pub since_exposure_id: i64,
    /// Inclusive upper bound of the covered id range.
    pub last_exposure_id: i64,
    /// Earliest `created_at` among the records in the run.
    pub first_exposure_created_at: DateTime<Utc>,
    /// Resolved region code.
    pub region: String,
    /// Bundle generation time; drives retention and watermark lookups.
    pub created_at: DateTime<Utc>,
}

/// Externally configured signature descriptor, embedded unchanged into every
/// bundle so clients can pick the right verification key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub app_bundle_id: String,
    pub verification_key_version: String,
    pub verification_key_id: String,
    pub signature_algorithm: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_key_drops_regions() {
        let record = KeyRecord {
            id: 1,
            created_at: Utc::now(),
            key_data: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
            rolling_start_interval_number: 2650000,
            rolling_period: 144,
            transmission_risk_level: 4,
            regions: vec!["US".to_string(), "CA".to_string()],
        };

        let key = record.to_export_key();
        assert_eq!(key.key_data, record.key_data);
        assert_eq!(key.rolling_period, 144);
        assert_eq!(key.created_at, record.created_at);
    }

    #[test]
    fn test_key_record_json_field_names() {
        let json = r#"{
            "id": 7,
            "createdAt": "2026-08-01T12:00:00Z",
            "keyData": "AAAAAAAAAAAAAAAAAAAAAA==",
            "rollingStartIntervalNumber": 2650000,
            "rollingPeriod": 144,
            "transmissionRiskLevel": 4,
            "regions": ["US"]
        }"#;

        let record: KeyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.regions, vec!["US".to_string()]);
    }
}
