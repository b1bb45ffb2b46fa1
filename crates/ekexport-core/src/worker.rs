//! Export orchestrator: one run from watermark lookup to metadata insert.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sha2::{Digest, Sha256};

use crate::config::ExportConfig;
use crate::db::ExposureDb;
use crate::error::ExportResult;
use crate::export::{
    encode_export, pack_bundle, BundleSigner, DEFAULT_BATCH_NUM, DEFAULT_BATCH_SIZE,
};
use crate::model::BundleMetadata;
use crate::partition::partition_by_region;
use crate::store::ExportStore;

/// Content type for uploaded bundles.
const BUNDLE_CONTENT_TYPE: &str = "application/zip";

/// What one orchestrator run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Watermark the run anchored to (exclusive lower bound).
    pub since_exposure_id: i64,
    /// Highest record id covered, equal to `since_exposure_id` when nothing
    /// was fetched.
    pub last_exposure_id: i64,
    /// Records fetched for the run, before partitioning.
    pub records: usize,
    /// Object-store paths written this run.
    pub bundles_written: Vec<String>,
    /// Regions skipped: already-recorded ranges plus batches with no
    /// exportable keys.
    pub regions_skipped: usize,
}

/// Drives one export pass over a database and object store.
pub struct ExportWorker<D, S> {
    db: Arc<D>,
    store: Arc<S>,
    signer: BundleSigner,
    config: ExportConfig,
}

impl<D: ExposureDb, S: ExportStore> ExportWorker<D, S> {
    /// Validates the config up front; a bad config never starts a run.
    pub fn new(
        db: Arc<D>,
        store: Arc<S>,
        signer: BundleSigner,
        config: ExportConfig,
    ) -> ExportResult<Self> {
        config.validate()?;
        Ok(Self {
            db,
            store,
            signer,
            config,
        })
    }

    /// Run one export pass anchored at `since`.
    ///
    /// Finds the watermark as of `since`, fetches everything newer,
    /// partitions by region, and writes one bundle per region that does not
    /// already have one for the range. Upload happens before the metadata
    /// insert: a crash between the two causes a harmless re-generation and
    /// overwrite on retry, never a metadata row pointing at a missing
    /// object.
    pub async fn run(&self, since: DateTime<Utc>) -> ExportResult<RunSummary> {
        let since_id = self.db.max_last_exposure_id_before(since).await?;
        let records = self.db.fetch_keys_since(since_id).await?;

        if records.is_empty() {
            tracing::info!(since_id, %since, "no new exposure keys, nothing to export");
            return Ok(RunSummary {
                since_exposure_id: since_id,
                last_exposure_id: since_id,
                ..RunSummary::default()
            });
        }

        // Range bounds come from the whole fetched set, before partitioning,
        // so every region's row covers the same (since, last] range.
        let mut last_id = since_id;
        let mut first_created_at = records[0].created_at;
        for record in &records {
            last_id = last_id.max(record.id);
            first_created_at = first_created_at.min(record.created_at);
        }

        let batches = partition_by_region(
            &records,
            &self.config.default_region,
            &self.config.native_regions,
        );

        let mut summary = RunSummary {
            since_exposure_id: since_id,
            last_exposure_id: last_id,
            records: records.len(),
            ..RunSummary::default()
        };

        for (region, batch) in &batches {
            if self.db.bundle_exists(since_id, last_id, region).await? {
                tracing::info!(region, since_id, last_id, "bundle already recorded, skipping");
                summary.regions_skipped += 1;
                continue;
            }

            let encoded = encode_export(
                batch,
                region,
                &self.config.signature_info,
                DEFAULT_BATCH_NUM,
                DEFAULT_BATCH_SIZE,
            )?;
            if encoded.key_count == 0 {
                tracing::warn!(region, "no exportable keys after filtering, skipping region");
                summary.regions_skipped += 1;
                continue;
            }

            let signature = self.signer.sign_export(
                &encoded.bytes,
                &self.config.signature_info,
                DEFAULT_BATCH_NUM,
                DEFAULT_BATCH_SIZE,
            )?;
            let bundle = pack_bundle(&encoded.bytes, &signature)?;
            let digest = hex::encode(Sha256::digest(&bundle));

            let now = Utc::now();
            let path = bundle_path(region, now);
            self.store
                .put(&path, Bytes::from(bundle), BUNDLE_CONTENT_TYPE)
                .await?;

            let row = BundleMetadata {
                path: path.clone(),
                exposure_count: batch.len() as i64,
                since_exposure_id: since_id,
                last_exposure_id: last_id,
                first_exposure_created_at: first_created_at,
                region: region.clone(),
                created_at: now,
            };
            match self.db.insert_bundle_metadata(row).await {
                Ok(()) => {}
                // A racing retry got there first; its bundle covers the
                // same range.
                Err(err) if err.is_duplicate() => {
                    tracing::warn!(region, since_id, last_id, "metadata row raced, keeping theirs");
                    summary.regions_skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            }

            tracing::info!(
                region,
                path,
                keys = encoded.key_count,
                sha256 = %digest,
                "export bundle written"
            );
            summary.bundles_written.push(path);
        }

        Ok(summary)
    }

    /// Run for `now`, then once per preceding midnight for `days` days.
    ///
    /// Each invocation is independent and idempotent, so this both
    /// backfills missed windows and verifies historical ones.
    pub async fn run_with_backfill(
        &self,
        now: DateTime<Utc>,
        days: u32,
    ) -> ExportResult<Vec<RunSummary>> {
        let mut summaries = Vec::with_capacity(days as usize + 1);
        summaries.push(self.run(now).await?);

        for day in 0..days {
            let midnight = (now - Duration::days(i64::from(day)))
                .date_naive()
                .and_time(NaiveTime::MIN)
                .and_utc();
            summaries.push(self.run(midnight).await?);
        }
        Ok(summaries)
    }
}

/// `exposures/{region lowercased}/{epoch_millis}.zip`. Millisecond
/// resolution keeps paths unique per invocation; collisions are not
/// specially handled.
fn bundle_path(region: &str, now: DateTime<Utc>) -> String {
    format!(
        "exposures/{}/{}.zip",
        region.to_lowercase(),
        now.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bundle_path_lowercases_region() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(bundle_path("DE", now), "exposures/de/1700000000123.zip");
    }
}
