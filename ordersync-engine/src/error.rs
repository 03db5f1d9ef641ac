//! Error types for ordersync-engine.

use std::path::PathBuf;

use thiserror::Error;

use ordersync_core::{FeedError, StoreError};

/// Errors that abort a whole pass. Per-record problems are reported as
/// [`RecordFailure`](crate::RecordFailure) values instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The snapshot could not be fetched.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// The stored set could not be loaded.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error on the sync-state file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sync-state JSON error.
    #[error("sync state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
