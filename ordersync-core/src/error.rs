//! Error types for ordersync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading or writing persisted orders and shipments.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document could not be parsed or serialized.
    #[error("store JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The record handed to the store cannot be persisted.
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors reaching or decoding the source feed. Always fatal to a pass.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed answered with a non-success HTTP status.
    #[error("source feed returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, DNS, TLS or timeout failure.
    #[error("source feed transport error: {0}")]
    Transport(String),

    /// The response body was not the expected JSON shape.
    #[error("source feed response could not be decoded: {0}")]
    Decode(String),

    /// The response decoded but carried no `orders` array.
    #[error("source feed response has no `orders` array")]
    MissingOrders,
}

/// Errors loading or saving `~/.ordersync/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value the feed needs is neither in the file nor in the environment.
    #[error("missing setting `{field}`; set it in config.yaml or via ${env}")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for ${env}: {value}")]
    InvalidEnv { env: &'static str, value: String },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn json_err(path: impl Into<PathBuf>, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        path: path.into(),
        source,
    }
}
