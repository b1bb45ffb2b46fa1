//! Object storage collaborator for generated bundles.
//!
//! The export path only ever needs `put` and an idempotent `delete`; `get`
//! exists for verification tooling and tests. Backed by the `object_store`
//! crate, so S3-compatible stores, the local filesystem, and an in-memory
//! store all sit behind the same trait.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload};

use crate::error::{ExportError, ExportResult};

/// Storage contract for export bundles.
#[async_trait]
pub trait ExportStore: Send + Sync {
    /// Write bundle bytes at `key`. Overwrites are allowed: a crash between
    /// upload and metadata insert is healed by re-generating and
    /// re-uploading the identical bundle.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> ExportResult<()>;

    /// Read bundle bytes back. Not used by the export path itself.
    async fn get(&self, key: &str) -> ExportResult<Bytes>;

    /// Delete the object at `key`. A missing object is success.
    async fn delete(&self, key: &str) -> ExportResult<()>;
}

/// Bundle store backed by `object_store`.
///
/// Supported URL schemes:
///
/// ```text
/// s3://bucket/prefix?region=eu-central-1
/// file:///var/exports
/// memory://   (tests)
/// ```
#[derive(Debug)]
pub struct ObjectStoreExportStore {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreExportStore {
    /// Wrap an existing `object_store` backend.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// Create an in-memory store for testing.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(object_store::memory::InMemory::new()),
        }
    }

    /// Create a store from a URL string.
    pub fn from_url(url: &str) -> ExportResult<Self> {
        let parsed = url::Url::parse(url).map_err(|e| ExportError::InvalidConfig {
            reason: format!("invalid store url '{url}': {e}"),
        })?;

        let inner: Arc<dyn ObjectStore> = match parsed.scheme() {
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            "file" => {
                let path = parsed.path();
                std::fs::create_dir_all(path).map_err(|e| ExportError::InvalidConfig {
                    reason: format!("failed to create store directory {path}: {e}"),
                })?;
                Arc::new(
                    object_store::local::LocalFileSystem::new_with_prefix(path).map_err(|e| {
                        ExportError::InvalidConfig {
                            reason: format!("failed to open local store at {path}: {e}"),
                        }
                    })?,
                )
            }
            "s3" => {
                let bucket = parsed.host_str().ok_or_else(|| ExportError::InvalidConfig {
                    reason: format!("s3 url '{url}' must include a bucket name"),
                })?;

                let mut builder =
                    object_store::aws::AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some((_, region)) = parsed.query_pairs().find(|(k, _)| k == "region") {
                    builder = builder.with_region(region.to_string());
                }

                Arc::new(builder.build().map_err(|e| ExportError::InvalidConfig {
                    reason: format!("failed to create S3 client: {e}"),
                })?)
            }
            scheme => {
                return Err(ExportError::InvalidConfig {
                    reason: format!("unsupported store scheme: {scheme}"),
                })
            }
        };

        Ok(Self { inner })
    }
}

fn storage_err(key: &str, err: impl std::fmt::Display) -> ExportError {
    ExportError::Storage {
        key: key.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ExportStore for ObjectStoreExportStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> ExportResult<()> {
        let path = object_store::path::Path::from(key);
        let attributes =
            Attributes::from_iter([(Attribute::ContentType, content_type.to_string())]);
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.inner
            .put_opts(&path, PutPayload::from_bytes(bytes), opts)
            .await
            .map_err(|e| storage_err(key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> ExportResult<Bytes> {
        let path = object_store::path::Path::from(key);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| storage_err(key, e))?;
        result.bytes().await.map_err(|e| storage_err(key, e))
    }

    async fn delete(&self, key: &str) -> ExportResult<()> {
        let path = object_store::path::Path::from(key);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            // Idempotent: the object may already be gone.
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(storage_err(key, e)),
        }
    }
}
