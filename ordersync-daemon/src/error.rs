use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop the daemon or fail a client call.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ordersync_core::ConfigError),

    /// A pass failed; the feed or the store is the cause.
    #[error(transparent)]
    Sync(#[from] ordersync_engine::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} closed")]
    ChannelClosed(&'static str),

    /// The peer answered `ok: false` or broke the line protocol.
    #[error("daemon: {0}")]
    Protocol(String),

    #[error("daemon is not running (no socket at {socket})")]
    DaemonNotRunning { socket: PathBuf },

    #[error("another daemon is already listening on {socket}")]
    AlreadyRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
