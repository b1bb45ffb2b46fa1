//! Database collaborator: key records and bundle metadata.
//!
//! The relational store itself is out of scope; this trait is the full
//! surface the export pipeline needs from it. [`MemoryDb`] is an in-process
//! implementation used by tests and the CLI's seeded demo mode, and it
//! enforces the same uniqueness invariant a real schema would.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ExportError, ExportResult};
use crate::model::{BundleMetadata, KeyRecord};

/// Database contract for the export orchestrator and retention sweeper.
#[async_trait]
pub trait ExposureDb: Send + Sync {
    /// All key records with `id > exposure_id`, sorted by `key_data`
    /// ascending. The content-derived sort keeps regeneration of the same
    /// id range byte-identical regardless of arrival order.
    async fn fetch_keys_since(&self, exposure_id: i64) -> ExportResult<Vec<KeyRecord>>;

    /// Insert one metadata row. Fails with
    /// [`ExportError::DuplicateBundle`] when a row already exists for the
    /// same `(since, last, region)` triple.
    async fn insert_bundle_metadata(&self, row: BundleMetadata) -> ExportResult<()>;

    /// Does a metadata row exist for this range and region?
    async fn bundle_exists(&self, since: i64, last: i64, region: &str) -> ExportResult<bool>;

    /// Greatest `last_exposure_id` among rows created before `cutoff`, or 0.
    async fn max_last_exposure_id_before(&self, cutoff: DateTime<Utc>) -> ExportResult<i64>;

    /// Delete key records with `created_at` before `threshold`; returns the
    /// deleted ids.
    async fn delete_expired_keys(&self, threshold: DateTime<Utc>) -> ExportResult<Vec<i64>>;

    /// Delete metadata rows with `last_exposure_id <= id`; returns
    /// `(row id, object path)` pairs so the caller can delete the objects.
    async fn delete_bundle_metadata_with_last_id_at_most(
        &self,
        id: i64,
    ) -> ExportResult<Vec<(i64, String)>>;
}

#[derive(Debug, Clone)]
struct StoredBundle {
    id: i64,
    row: BundleMetadata,
}

#[derive(Debug, Default)]
struct MemoryDbState {
    keys: Vec<KeyRecord>,
    bundles: Vec<StoredBundle>,
    next_bundle_id: i64,
}

/// In-memory [`ExposureDb`].
#[derive(Debug, Default)]
pub struct MemoryDb {
    state: Mutex<MemoryDbState>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed key records (the ingestion path stands in for this in
    /// production).
    pub fn insert_keys(&self, records: impl IntoIterator<Item = KeyRecord>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.keys.extend(records);
    }

    /// Snapshot of all metadata rows, for assertions.
    pub fn bundles(&self) -> Vec<BundleMetadata> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.bundles.iter().map(|b| b.row.clone()).collect()
    }

    /// Number of key records currently held.
    pub fn key_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.keys.len()
    }
}

#[async_trait]
impl ExposureDb for MemoryDb {
    async fn fetch_keys_since(&self, exposure_id: i64) -> ExportResult<Vec<KeyRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<KeyRecord> = state
            .keys
            .iter()
            .filter(|k| k.id > exposure_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.key_data.cmp(&b.key_data));
        Ok(records)
    }

    async fn insert_bundle_metadata(&self, row: BundleMetadata) -> ExportResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let duplicate = state.bundles.iter().any(|b| {
            b.row.since_exposure_id == row.since_exposure_id
                && b.row.last_exposure_id == row.last_exposure_id
                && b.row.region == row.region
        });
        if duplicate {
            return Err(ExportError::DuplicateBundle {
                since: row.since_exposure_id,
                last: row.last_exposure_id,
                region: row.region,
            });
        }

        let id = state.next_bundle_id;
        state.next_bundle_id += 1;
        state.bundles.push(StoredBundle { id, row });
        Ok(())
    }

    async fn bundle_exists(&self, since: i64, last: i64, region: &str) -> ExportResult<bool> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.bundles.iter().any(|b| {
            b.row.since_exposure_id == since
                && b.row.last_exposure_id == last
                && b.row.region == region
        }))
    }

    async fn max_last_exposure_id_before(&self, cutoff: DateTime<Utc>) -> ExportResult<i64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .bundles
            .iter()
            .filter(|b| b.row.created_at < cutoff)
            .map(|b| b.row.last_exposure_id)
            .max()
            .unwrap_or(0))
    }

    async fn delete_expired_keys(&self, threshold: DateTime<Utc>) -> ExportResult<Vec<i64>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let deleted: Vec<i64> = state
            .keys
            .iter()
            .filter(|k| k.created_at < threshold)
            .map(|k| k.id)
            .collect();
        state.keys.retain(|k| k.created_at >= threshold);
        Ok(deleted)
    }

    async fn delete_bundle_metadata_with_last_id_at_most(
        &self,
        id: i64,
    ) -> ExportResult<Vec<(i64, String)>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let removed: Vec<(i64, String)> = state
            .bundles
            .iter()
            .filter(|b| b.row.last_exposure_id <= id)
            .map(|b| (b.id, b.row.path.clone()))
            .collect();
        state.bundles.retain(|b| b.row.last_exposure_id > id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: i64, key_data: &str, age_days: i64) -> KeyRecord {
        KeyRecord {
            id,
            created_at: Utc::now() - Duration::days(age_days),
            key_data: key_data.to_string(),
            rolling_start_interval_number: 2_650_000,
            rolling_period: 144,
            transmission_risk_level: 4,
            regions: vec!["US".to_string()],
        }
    }

    fn row(since: i64, last: i64, region: &str) -> BundleMetadata {
        BundleMetadata {
            path: format!("exposures/{}/1.zip", region.to_lowercase()),
            exposure_count: (last - since),
            since_exposure_id: since,
            last_exposure_id: last,
            first_exposure_created_at: Utc::now(),
            region: region.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fetch_sorts_by_key_data() {
        let db = MemoryDb::new();
        db.insert_keys(vec![record(1, "zzz", 0), record(2, "aaa", 0), record(3, "mmm", 0)]);

        let fetched = db.fetch_keys_since(0).await.unwrap();
        let keys: Vec<&str> = fetched.iter().map(|k| k.key_data.as_str()).collect();
        assert_eq!(keys, vec!["aaa", "mmm", "zzz"]);
    }

    #[tokio::test]
    async fn test_fetch_respects_watermark() {
        let db = MemoryDb::new();
        db.insert_keys(vec![record(1, "a", 0), record(2, "b", 0), record(3, "c", 0)]);

        let fetched = db.fetch_keys_since(2).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, 3);
    }

    #[tokio::test]
    async fn test_duplicate_triple_rejected() {
        let db = MemoryDb::new();
        db.insert_bundle_metadata(row(0, 5, "US")).await.unwrap();

        let err = db.insert_bundle_metadata(row(0, 5, "US")).await.unwrap_err();
        assert!(err.is_duplicate());

        // Different region or range is fine.
        db.insert_bundle_metadata(row(0, 5, "DE")).await.unwrap();
        db.insert_bundle_metadata(row(5, 9, "US")).await.unwrap();
    }

    #[tokio::test]
    async fn test_watermark_lookup_honors_cutoff() {
        let db = MemoryDb::new();
        let mut old = row(0, 5, "US");
        old.created_at = Utc::now() - Duration::days(2);
        db.insert_bundle_metadata(old).await.unwrap();
        db.insert_bundle_metadata(row(5, 9, "US")).await.unwrap();

        let cutoff = Utc::now() - Duration::days(1);
        assert_eq!(db.max_last_exposure_id_before(cutoff).await.unwrap(), 5);
        assert_eq!(db.max_last_exposure_id_before(Utc::now()).await.unwrap(), 9);

        let empty = MemoryDb::new();
        assert_eq!(empty.max_last_exposure_id_before(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expiry_deletes_only_old_keys() {
        let db = MemoryDb::new();
        db.insert_keys(vec![record(1, "a", 15), record(2, "b", 13)]);

        let threshold = Utc::now() - Duration::days(14);
        let deleted = db.delete_expired_keys(threshold).await.unwrap();
        assert_eq!(deleted, vec![1]);
        assert_eq!(db.key_count(), 1);
    }

    #[tokio::test]
    async fn test_metadata_expiry_returns_paths() {
        let db = MemoryDb::new();
        db.insert_bundle_metadata(row(0, 5, "US")).await.unwrap();
        db.insert_bundle_metadata(row(5, 9, "US")).await.unwrap();

        let removed = db.delete_bundle_metadata_with_last_id_at_most(5).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].1, "exposures/us/1.zip");
        assert_eq!(db.bundles().len(), 1);
    }
}
