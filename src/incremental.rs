//! Incremental-state timestamp snapshotting
//!
//! rustc gates incremental reuse on file mtimes, and a cache restore stamps
//! every file with "now". The snapshot records each incremental file's
//! mtime before the save so the restore path can re-stamp them afterwards;
//! the incremental roots themselves are cached verbatim.

use crate::error::{GroomError, GroomResult};
use crate::process::exists;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Recorded modification times of incremental build state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MtimeSnapshot {
    /// Discovered `incremental` directories, to be cache-stored verbatim
    pub roots: Vec<PathBuf>,
    /// File path to mtime in milliseconds since the epoch
    pub times: HashMap<PathBuf, i64>,
}

/// Collect every `incremental` directory beneath the given build-output
/// roots' profile directories and record all file mtimes beneath them
pub async fn save_mtimes(target_dirs: &[PathBuf]) -> GroomResult<MtimeSnapshot> {
    let mut stack = Vec::new();

    for dir in target_dirs {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(GroomError::io(
                    format!("opening target directory {}", dir.display()),
                    e,
                ))
            }
        };
        while let Ok(Some(maybe_profile)) = entries.next_entry().await {
            let incremental_dir = maybe_profile.path().join("incremental");
            if exists(&incremental_dir).await {
                stack.push(incremental_dir);
            }
        }
    }

    let roots = stack.clone();
    let mut times = HashMap::new();

    while let Some(dir_name) = stack.pop() {
        let mut entries = match fs::read_dir(&dir_name).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("failed to open \"{}\": {}", dir_name.display(), e);
                continue;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if is_dir {
                stack.push(path);
            } else {
                match entry.metadata().await {
                    Ok(meta) => {
                        let mtime = FileTime::from_last_modification_time(&meta);
                        let millis =
                            mtime.unix_seconds() * 1000 + i64::from(mtime.nanoseconds()) / 1_000_000;
                        times.insert(path, millis);
                    }
                    Err(e) => debug!("failed to stat \"{}\": {}", path.display(), e),
                }
            }
        }
    }

    debug!(
        "snapshotted {} incremental files under {} roots",
        times.len(),
        roots.len()
    );
    Ok(MtimeSnapshot { roots, times })
}

/// Re-stamp every recorded mtime after a cache restore.
///
/// A file that cannot be re-stamped just degrades to a full incremental
/// rebuild for that compilation unit, so failures are logged and skipped.
pub fn restore_mtimes(snapshot: &MtimeSnapshot) {
    let mut restored = 0usize;
    for (path, millis) in &snapshot.times {
        let seconds = millis.div_euclid(1000);
        let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
        let mtime = FileTime::from_unix_time(seconds, nanos);
        match filetime::set_file_mtime(path, mtime) {
            Ok(()) => restored += 1,
            Err(e) => warn!("failed to restore mtime of \"{}\": {}", path.display(), e),
        }
    }
    debug!("restored {} of {} mtimes", restored, snapshot.times.len());
}

/// Write a snapshot to a JSON file
pub async fn write_snapshot(snapshot: &MtimeSnapshot, path: &Path) -> GroomResult<()> {
    let content = serde_json::to_string(snapshot)?;
    fs::write(path, content)
        .await
        .map_err(|e| GroomError::io(format!("writing snapshot to {}", path.display()), e))
}

/// Read a snapshot back from a JSON file
pub async fn read_snapshot(path: &Path) -> GroomResult<MtimeSnapshot> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| GroomError::io(format!("reading snapshot from {}", path.display()), e))?;
    Ok(serde_json::from_str(&content)?)
}
