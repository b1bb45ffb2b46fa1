//! Signed, region-partitioned exposure-key export bundles.
//!
//! The pipeline turns newly observed exposure keys into zip bundles that
//! mobile exposure-notification clients can download and verify:
//!
//! 1. [`partition::partition_by_region`] groups key records into per-region
//!    batches according to the operator's region-resolution policy.
//! 2. [`export::encode_export`] serializes a batch into the fixed binary wire
//!    format (16-byte magic header + schema-encoded message).
//! 3. [`export::BundleSigner`] computes a detached ECDSA-P256/SHA-256
//!    signature over the payload and encodes the signature list.
//! 4. [`export::pack_bundle`] packs payload and signature list into a zip
//!    archive with exactly two entries, `export.bin` and `export.sig`.
//! 5. [`worker::ExportWorker`] drives one run end to end: watermark lookup,
//!    partitioning, idempotence checks, upload, metadata insert.
//!
//! [`retention::RetentionSweeper`] retires key records and bundles once they
//! age out. The relational store and object storage are collaborators behind
//! the [`db::ExposureDb`] and [`store::ExportStore`] traits.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod model;
pub mod partition;
pub mod retention;
pub mod store;
pub mod wire;
pub mod worker;

// Convenience re-exports
pub use config::ExportConfig;
pub use db::{ExposureDb, MemoryDb};
pub use error::{ExportError, ExportResult};
pub use export::{pack_bundle, unpack_bundle, BundleSigner, EncodedExport, EXPORT_BIN, EXPORT_SIG};
pub use model::{BundleMetadata, ExportKey, KeyRecord, SignatureInfo};
pub use partition::partition_by_region;
pub use retention::{RetentionSweeper, SweepSummary};
pub use store::{ExportStore, ObjectStoreExportStore};
pub use worker::{ExportWorker, RunSummary};

// Re-export bytes for callers handing buffers to the store
pub use bytes::Bytes;
