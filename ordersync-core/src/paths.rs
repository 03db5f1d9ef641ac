//! On-disk layout under `<home>/.ordersync/`.
//!
//! ```text
//! ~/.ordersync/
//!   config.yaml        (mode 0600)
//!   orders/<id>.json   (one stored order per file)
//!   shipments.json
//!   state.json         (last sync pass summary)
//!   daemon.sock
//! ```

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const SHIPMENTS_FILE: &str = "shipments.json";
pub const STATE_FILE: &str = "state.json";
pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn ordersync_root(home: &Path) -> PathBuf {
    home.join(".ordersync")
}

pub fn config_path(home: &Path) -> PathBuf {
    ordersync_root(home).join(CONFIG_FILE)
}

pub fn orders_dir(home: &Path) -> PathBuf {
    ordersync_root(home).join("orders")
}

pub fn shipments_path(home: &Path) -> PathBuf {
    ordersync_root(home).join(SHIPMENTS_FILE)
}

pub fn state_path(home: &Path) -> PathBuf {
    ordersync_root(home).join(STATE_FILE)
}

pub fn socket_path(home: &Path) -> PathBuf {
    ordersync_root(home).join(DAEMON_SOCKET)
}

#[cfg(unix)]
pub(crate) fn set_dir_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}
#[cfg(not(unix))]
pub(crate) fn set_dir_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}
#[cfg(not(unix))]
pub(crate) fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
