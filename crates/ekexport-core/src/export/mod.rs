//! Export bundle construction: encode, sign, package.

pub mod archive;
pub mod encoder;
pub mod signer;

pub use archive::{pack_bundle, unpack_bundle};
pub use encoder::{encode_export, EncodedExport};
pub use signer::BundleSigner;

/// Payload entry name inside the bundle archive.
pub const EXPORT_BIN: &str = "export.bin";

/// Signature-list entry name inside the bundle archive.
pub const EXPORT_SIG: &str = "export.sig";

/// Single-batch-per-file policy: every bundle is batch 1 of 1. Multi-batch
/// chunking is an extension point, not exercised by the orchestrator.
pub const DEFAULT_BATCH_NUM: i32 = 1;
pub const DEFAULT_BATCH_SIZE: i32 = 1;
