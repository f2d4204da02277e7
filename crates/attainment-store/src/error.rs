//! Store error types.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Failures raised by the stores themselves, as opposed to the
/// `ProgressError::NotFound` rows they report for missing records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot file could not be read or written.
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file is not a valid dataset.
    #[error("invalid snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A failure injected for testing.
    #[error("injected failure: {0}")]
    Injected(String),

    /// A write to this submission was rejected.
    #[error("write rejected for submission {0}")]
    WriteRejected(Uuid),

    /// A previous writer panicked while holding the dataset lock.
    #[error("dataset lock poisoned")]
    Poisoned,
}
