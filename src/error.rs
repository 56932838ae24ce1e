//! Error types for replication operations.

use std::io;
use thiserror::Error;

/// Errors that can occur during a replication run.
///
/// Per-object errors (`DiffCheckFailed`, `SourceMissing`, `CopyFailed`,
/// `VerificationFailed`) are caught at the worker boundary and converted into
/// `Outcome::Failed`; only `EnumerationDenied` (without a fallback) and
/// `FatalInit` abort the whole run.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// The source bucket listing was rejected by access policy.
    ///
    /// Recoverable by switching to probe-based discovery when the fallback is
    /// enabled, terminal otherwise.
    #[error("source listing denied: {0}")]
    EnumerationDenied(String),

    /// The destination metadata lookup errored for a reason other than
    /// the object being absent.
    #[error("destination check failed for '{key}': {cause}")]
    DiffCheckFailed {
        /// Key whose destination lookup failed.
        key: String,
        /// Underlying service error.
        cause: String,
    },

    /// The source object vanished between enumeration and copy.
    #[error("source object '{key}' no longer exists")]
    SourceMissing {
        /// Key that disappeared.
        key: String,
    },

    /// The server-side copy call itself errored.
    #[error("copy failed for '{key}': {cause}")]
    CopyFailed {
        /// Key whose copy failed.
        key: String,
        /// Underlying service error.
        cause: String,
    },

    /// The copy call reported success but the post-copy check did not match.
    ///
    /// Kept distinct from `CopyFailed` so operators can tell "service lied"
    /// from "service rejected".
    #[error("post-copy verification failed for '{key}'")]
    VerificationFailed {
        /// Key whose verification failed.
        key: String,
    },

    /// Client construction or bucket accessibility check failed before any
    /// object work began.
    #[error("initialization failed: {0}")]
    FatalInit(String),

    /// I/O error while persisting a run artifact.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// JSON serialization error for the run summary.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl ReplicationError {
    /// The object key this error is about, for per-object variants.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::DiffCheckFailed { key, .. }
            | Self::SourceMissing { key }
            | Self::CopyFailed { key, .. }
            | Self::VerificationFailed { key } => Some(key),
            _ => None,
        }
    }
}
