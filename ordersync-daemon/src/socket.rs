//! Socket side of the daemon: bind, accept, answer request lines.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use ordersync_core::paths::socket_path;

use crate::error::{io_err, DaemonError};
use crate::protocol::{accepts_connections, DaemonRequest, DaemonResponse};
use crate::runtime::{Pass, PassKind, PassSource, Shared};

/// Bind `path` (mode 0600), clearing a socket file left by a dead daemon.
pub(crate) fn bind(path: &Path) -> Result<UnixListener, DaemonError> {
    clear_stale_socket(path)?;
    let listener = UnixListener::bind(path).map_err(|e| io_err(path, e))?;
    restrict_permissions(path)?;
    Ok(listener)
}

fn clear_stale_socket(path: &Path) -> Result<(), DaemonError> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    if accepts_connections(path) {
        return Err(DaemonError::AlreadyRunning {
            socket: path.to_path_buf(),
        });
    }
    tracing::warn!(socket = %path.display(), "removing stale daemon socket");
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(io_err(path, err)),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

/// Accept clients until shutdown, then remove the socket file.
pub(crate) async fn serve(
    listener: UnixListener,
    shared: Shared,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let path = socket_path(&shared.home);
    let outcome = loop {
        tokio::select! {
            _ = shutdown.recv() => break Ok(()),
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_client(stream, shared).await {
                            tracing::warn!(error = %err, "socket client failed");
                        }
                    });
                }
                Err(err) => break Err(io_err(&path, err)),
            },
        }
    };

    if let Err(err) = fs::remove_file(&path) {
        if err.kind() != ErrorKind::NotFound {
            tracing::warn!(socket = %path.display(), error = %err, "could not remove socket");
        }
    }
    outcome
}

async fn handle_client(stream: UnixStream, shared: Shared) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket", e))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request = match serde_json::from_str::<DaemonRequest>(line) {
            Ok(request) => request,
            Err(err) => {
                let response = DaemonResponse::error(format!("invalid request: {err}"));
                send(&mut writer, &response).await?;
                continue;
            }
        };

        let stop = request == DaemonRequest::Stop;
        let response = dispatch(request, &shared).await;
        send(&mut writer, &response).await?;
        // Answer first so the client sees the acknowledgement.
        if stop {
            shared.request_shutdown();
            break;
        }
    }
    Ok(())
}

async fn dispatch(request: DaemonRequest, shared: &Shared) -> DaemonResponse {
    let default_status = shared.settings.status;
    let pass = match request {
        DaemonRequest::Status => return DaemonResponse::ok(shared.status_payload().await),
        DaemonRequest::Stop => return DaemonResponse::ok(json!({ "stopping": true })),
        DaemonRequest::Sync { status, dry_run } => Pass {
            dry_run,
            ..Pass::new(PassKind::Sync, status.unwrap_or(default_status))
        },
        DaemonRequest::Compare { status } => {
            Pass::new(PassKind::Compare, status.unwrap_or(default_status))
        }
        DaemonRequest::Ingest { status } => {
            Pass::new(PassKind::Ingest, status.unwrap_or(default_status))
        }
    };
    let outcome = shared.run_pass(pass, PassSource::Socket).await;
    match outcome {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => DaemonResponse::error(err.to_string()),
    }
}

async fn send(writer: &mut OwnedWriteHalf, response: &DaemonResponse) -> Result<(), DaemonError> {
    let mut frame = serde_json::to_vec(response)?;
    frame.push(b'\n');
    writer
        .write_all(&frame)
        .await
        .map_err(|e| io_err("daemon socket", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn leftover_socket_file_is_cleared() {
        let home = TempDir::new().expect("home");
        let path = home.path().join("daemon.sock");
        fs::write(&path, b"").unwrap();

        clear_stale_socket(&path).expect("stale socket cleared");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn live_socket_is_not_stolen() {
        let home = TempDir::new().expect("home");
        let path = home.path().join("daemon.sock");
        let _listener = bind(&path).expect("first bind");

        let err = bind(&path).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { .. }), "got {err}");
        assert!(path.exists());
    }
}
