//! Line protocol spoken over `~/.ordersync/daemon.sock`: one JSON request per
//! line, one JSON response line back.
//!
//! ```text
//! → {"cmd":"sync","status":"any"}
//! ← {"ok":true,"data":{"new":[...],"updated":[...],...}}
//! ```

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ordersync_core::paths::socket_path;
use ordersync_core::StatusFilter;

use crate::error::{io_err, DaemonError};

/// True when something accepts connections on `path`.
pub(crate) fn accepts_connections(path: &Path) -> bool {
    UnixStream::connect(path).is_ok()
}

/// True when a daemon is listening under `home`. Passes run outside the
/// daemon must go through it while this holds.
pub fn daemon_running(home: &Path) -> bool {
    accepts_connections(&socket_path(home))
}

const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DaemonRequest {
    Status,
    /// Immediate sync pass. `status` overrides the configured filter.
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<StatusFilter>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        dry_run: bool,
    },
    /// Report-mode pass; nothing is written.
    Compare {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<StatusFilter>,
    },
    /// Insert-only pass; stored orders are left as they are.
    Ingest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<StatusFilter>,
    },
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// `data` of a successful response, or the daemon's error message.
    pub fn into_result(self) -> Result<Value, DaemonError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        let message = self
            .error
            .unwrap_or_else(|| "request failed without a message".to_string());
        Err(DaemonError::Protocol(message))
    }
}

/// Blocking client for one daemon socket. Opens a fresh connection per call.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(home: &Path) -> Self {
        Self {
            socket: socket_path(home),
        }
    }

    pub fn send(&self, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
        let line = serde_json::to_string(request)?;
        self.exchange(&line)
    }

    /// Send and unwrap the response's `data`.
    pub fn call(&self, request: &DaemonRequest) -> Result<Value, DaemonError> {
        self.send(request)?.into_result()
    }

    /// Write one raw line and read one response line.
    pub fn exchange(&self, line: &str) -> Result<DaemonResponse, DaemonError> {
        let mut stream = self.connect()?;
        let io = |e| io_err(&self.socket, e);

        stream.write_all(line.as_bytes()).map_err(io)?;
        stream.write_all(b"\n").map_err(io)?;
        stream.flush().map_err(io)?;

        let reply = BufReader::new(&stream).lines().next().transpose().map_err(io)?;
        let Some(reply) = reply else {
            return Err(DaemonError::Protocol(
                "connection closed before a response arrived".to_string(),
            ));
        };
        Ok(serde_json::from_str(reply.trim_end())?)
    }

    fn connect(&self) -> Result<UnixStream, DaemonError> {
        if !self.socket.exists() {
            return Err(self.not_running());
        }
        UnixStream::connect(&self.socket).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                self.not_running()
            }
            _ => io_err(&self.socket, err),
        })
    }

    fn not_running(&self) -> DaemonError {
        DaemonError::DaemonNotRunning {
            socket: self.socket.clone(),
        }
    }
}

/// Runtime status. Retries briefly so a daemon that is still binding its
/// socket is not reported as down.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let client = DaemonClient::new(home);
    let mut attempt = 1;
    loop {
        match client.call(&DaemonRequest::Status) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                std::thread::sleep(STATUS_RETRY_DELAY);
            }
            outcome => return outcome,
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    DaemonClient::new(home)
        .call(&DaemonRequest::Stop)
        .map(drop)
}

/// Queue a sync pass and wait for its report.
pub fn request_sync(
    home: &Path,
    status: Option<StatusFilter>,
    dry_run: bool,
) -> Result<Value, DaemonError> {
    DaemonClient::new(home).call(&DaemonRequest::Sync { status, dry_run })
}

/// Queue an insert-only pass and wait for its report.
pub fn request_ingest(home: &Path, status: Option<StatusFilter>) -> Result<Value, DaemonError> {
    DaemonClient::new(home).call(&DaemonRequest::Ingest { status })
}

/// Queue a report-mode pass and wait for its comparison.
pub fn request_compare(home: &Path, status: Option<StatusFilter>) -> Result<Value, DaemonError> {
    DaemonClient::new(home).call(&DaemonRequest::Compare { status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn requests_are_tagged_by_cmd() {
        assert_eq!(
            serde_json::to_value(DaemonRequest::Sync {
                status: None,
                dry_run: false
            })
            .unwrap(),
            json!({"cmd": "sync"})
        );
        assert_eq!(
            serde_json::to_value(DaemonRequest::Sync {
                status: None,
                dry_run: true
            })
            .unwrap(),
            json!({"cmd": "sync", "dry_run": true})
        );
        let parsed: DaemonRequest =
            serde_json::from_str(r#"{"cmd":"ingest","status":"closed"}"#).unwrap();
        assert_eq!(
            parsed,
            DaemonRequest::Ingest {
                status: Some(StatusFilter::Closed)
            }
        );
        assert_eq!(
            serde_json::to_value(DaemonRequest::Compare {
                status: Some(StatusFilter::Any)
            })
            .unwrap(),
            json!({"cmd": "compare", "status": "any"})
        );
        let parsed: DaemonRequest = serde_json::from_str(r#"{"cmd":"stop"}"#).unwrap();
        assert_eq!(parsed, DaemonRequest::Stop);
        assert!(serde_json::from_str::<DaemonRequest>(r#"{"cmd":"reindex"}"#).is_err());
    }

    #[test]
    fn failed_response_carries_the_daemon_message() {
        let err = DaemonResponse::error("boom").into_result().unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(ref msg) if msg == "boom"));
        assert_eq!(
            DaemonResponse::ok(json!({"a": 1})).into_result().unwrap(),
            json!({"a": 1})
        );
    }

    #[test]
    fn missing_socket_means_not_running() {
        let home = TempDir::new().unwrap();
        let err = DaemonClient::new(home.path())
            .send(&DaemonRequest::Status)
            .unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
        assert!(!daemon_running(home.path()));
    }
}
