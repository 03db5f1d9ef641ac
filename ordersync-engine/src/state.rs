//! Sync state: summary of the last applied sync pass.
//!
//! Persists a [`SyncState`] JSON document at `<home>/.ordersync/state.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the stores.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ordersync_core::{paths, StatusFilter};

use crate::error::{io_err, SyncError};

/// Number of records in each classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub archived: usize,
    pub failed: usize,
}

/// On-disk sync state payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub synced_at: DateTime<Utc>,
    pub status: StatusFilter,
    pub counts: SyncCounts,
}

/// Load the sync state. `None` if no pass has been recorded yet.
pub fn load_at(home: &Path) -> Result<Option<SyncState>, SyncError> {
    let path = paths::state_path(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save the sync state atomically.
pub fn save_at(home: &Path, state: &SyncState) -> Result<(), SyncError> {
    let path = paths::state_path(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid sync state path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}
