//! Error types for the export pipeline.

use thiserror::Error;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while building, storing, or retiring export bundles.
///
/// Validation skips (a key with the wrong decoded length) and idempotent
/// skips (a bundle that already exists for a range) are log lines, not
/// variants here: neither aborts a run.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The encoder was handed a batch with no records at all. The
    /// partitioner never emits empty batches, so this is a caller bug.
    #[error("empty batch: encoder requires at least one record")]
    EmptyBatch,

    /// Malformed signing key or signing failure. Fatal to the invocation:
    /// an unsigned bundle must never be produced.
    #[error("signing failure: {reason}")]
    Crypto { reason: String },

    /// Configuration rejected before any work was attempted.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Upload or delete against the object store failed.
    #[error("storage failure for '{key}': {message}")]
    Storage { key: String, message: String },

    /// The database collaborator failed. Reserved for fallible backends
    /// behind `ExposureDb`; the in-memory implementation never constructs
    /// it.
    #[error("database failure: {message}")]
    Database { message: String },

    /// A metadata row already exists for this `(since, last, region)`
    /// triple. Safe to treat as success when racing a retried invocation.
    #[error("bundle already recorded for range ({since}, {last}] region {region}")]
    DuplicateBundle {
        since: i64,
        last: i64,
        region: String,
    },

    /// Zip packaging failed.
    #[error("archive failure: {message}")]
    Archive { message: String },

    /// Wire-format serialization failed.
    #[error("wire encoding failure: {message}")]
    Encode { message: String },

    /// Some bundle objects could not be deleted during a retention sweep.
    /// Every delete was still attempted; the metadata rows are already gone.
    #[error("retention sweep failed for {failed} of {attempted} objects")]
    SweepIncomplete { attempted: usize, failed: usize },
}

impl ExportError {
    /// Returns true if this error means the bundle was already recorded.
    /// Useful for idempotent insert handling.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateBundle { .. })
    }

    /// Returns true if the whole invocation should stop: no further region
    /// should be attempted after a config or crypto failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Crypto { .. } | Self::InvalidConfig { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_predicate() {
        let err = ExportError::DuplicateBundle {
            since: 0,
            last: 7,
            region: "DE".to_string(),
        };
        assert!(err.is_duplicate());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_database_variant_renders_message() {
        let err = ExportError::Database {
            message: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "database failure: connection reset");
        assert!(!err.is_fatal());
        assert!(!err.is_duplicate());
    }

    #[test]
    fn test_fatal_predicate() {
        let err = ExportError::Crypto {
            reason: "bad key".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_duplicate());
    }
}
