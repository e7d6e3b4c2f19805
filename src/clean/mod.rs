//! Cache pruning passes
//!
//! Each pass walks one directory family of a restored cache and deletes
//! everything the current dependency graph does not reference:
//!
//! - [`target::clean_target_dir`]: build-output trees
//! - [`registry::clean_registry`]: `$CARGO_HOME/registry`
//! - [`git::clean_git`]: `$CARGO_HOME/git`
//! - [`bin::clean_bin`]: `$CARGO_HOME/bin`
//!
//! All passes are pessimistic: anything unrecognized is deleted, since the
//! build tool can regenerate it. Deletions are best-effort at single-entry
//! granularity; a failed delete is logged and siblings are still processed.

pub mod bin;
pub mod git;
pub mod keep;
pub mod registry;
pub mod target;

pub use bin::{clean_bin, get_cargo_bins};
pub use git::clean_git;
pub use registry::clean_registry;
pub use target::clean_target_dir;

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::debug;

/// Staleness window for the age-based mode
pub(crate) const ONE_WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

/// Delete a directory entry, best-effort.
///
/// Missing-file races and permission failures are swallowed: a file that
/// cannot be deleted just makes the cache a little larger.
pub(crate) async fn rm(entry: &fs::DirEntry) {
    let path = entry.path();
    debug!("deleting \"{}\"", path.display());
    let is_dir = match entry.file_type().await {
        Ok(ft) => ft.is_dir(),
        Err(e) => {
            debug!("failed to stat \"{}\": {}", path.display(), e);
            return;
        }
    };
    let result = if is_dir {
        fs::remove_dir_all(&path).await
    } else {
        fs::remove_file(&path).await
    };
    if let Err(e) = result {
        if e.kind() != ErrorKind::NotFound {
            debug!("failed to delete \"{}\": {}", path.display(), e);
        }
    }
}

/// Delete a directory tree, best-effort
pub(crate) async fn rm_rf(path: &Path) {
    debug!("deleting \"{}\"", path.display());
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != ErrorKind::NotFound {
            debug!("failed to delete \"{}\": {}", path.display(), e);
        }
    }
}

/// Remove entries of `dir` that match some staleness criteria.
///
/// In the default mode an entry is kept when its name, with any trailing
/// `-<hash>` suffix stripped (split at the last `-`), appears in `keep`.
///
/// With `check_age` set, name filtering is bypassed entirely and an entry
/// is deleted exactly when its mtime is older than [`ONE_WEEK`]. This mode
/// is used for the pre-emptive clean on a cache-key mismatch, where the
/// package list does not describe what was restored.
///
/// A missing `dir` is a no-op; any other open failure propagates.
pub(crate) async fn rm_except(
    dir: &Path,
    keep: &HashSet<String>,
    check_age: bool,
) -> crate::GroomResult<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(crate::GroomError::io(
                format!("opening directory {}", dir.display()),
                e,
            ))
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!("failed to read entry in \"{}\": {}", dir.display(), e);
                break;
            }
        };

        if check_age {
            let outdated = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(mtime) => SystemTime::now()
                    .duration_since(mtime)
                    .map(|age| age > ONE_WEEK)
                    .unwrap_or(false),
                Err(e) => {
                    debug!("failed to stat \"{}\": {}", entry.path().display(), e);
                    continue;
                }
            };
            if outdated {
                rm(&entry).await;
            }
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        // strip the trailing hash; entries named exactly after a keep entry
        // (no hash suffix) survive as well
        let stem = match name.rfind('-') {
            Some(idx) => &name[..idx],
            None => &name,
        };
        if !keep.contains(stem) && !keep.contains(name.as_ref()) {
            rm(&entry).await;
        }
    }

    Ok(())
}
