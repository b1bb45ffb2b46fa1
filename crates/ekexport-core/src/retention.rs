//! Retention sweeper: retires aged-out key records, metadata rows, and
//! bundle objects.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;

use crate::db::ExposureDb;
use crate::error::{ExportError, ExportResult};
use crate::model::RETENTION_DAYS;
use crate::store::ExportStore;

/// What one sweep did.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub keys_deleted: usize,
    pub bundles_deleted: usize,
}

/// Deletes key records older than [`RETENTION_DAYS`], then the metadata rows
/// (and objects) whose ranges fall entirely below the deleted watermark.
pub struct RetentionSweeper<D, S> {
    db: Arc<D>,
    store: Arc<S>,
}

impl<D: ExposureDb, S: ExportStore> RetentionSweeper<D, S> {
    pub fn new(db: Arc<D>, store: Arc<S>) -> Self {
        Self { db, store }
    }

    /// Run one sweep as of `now`.
    ///
    /// Object deletes are issued concurrently and all of them are awaited;
    /// per-object failures are captured individually so one failure cannot
    /// mask the others. A missing object counts as success. If any delete
    /// failed, [`ExportError::SweepIncomplete`] is returned after every
    /// delete has been attempted — the metadata rows are gone either way,
    /// and a re-run simply finds nothing left to delete.
    pub async fn sweep(&self, now: DateTime<Utc>) -> ExportResult<SweepSummary> {
        let threshold = now - Duration::days(RETENTION_DAYS);
        let deleted = self.db.delete_expired_keys(threshold).await?;

        let Some(watermark) = deleted.iter().copied().max() else {
            tracing::info!(%threshold, "no expired exposure keys");
            return Ok(SweepSummary::default());
        };
        tracing::info!(keys = deleted.len(), watermark, "deleted expired exposure keys");

        let rows = self
            .db
            .delete_bundle_metadata_with_last_id_at_most(watermark)
            .await?;

        let results = join_all(rows.iter().map(|(_, path)| self.store.delete(path))).await;

        let mut failed = 0;
        for ((id, path), result) in rows.iter().zip(results) {
            if let Err(err) = result {
                failed += 1;
                tracing::warn!(bundle_id = id, path, %err, "failed to delete bundle object");
            }
        }
        if failed > 0 {
            return Err(ExportError::SweepIncomplete {
                attempted: rows.len(),
                failed,
            });
        }

        tracing::info!(bundles = rows.len(), "retention sweep complete");
        Ok(SweepSummary {
            keys_deleted: deleted.len(),
            bundles_deleted: rows.len(),
        })
    }
}
