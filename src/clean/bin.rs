//! Installed-binary grooming
//!
//! `cargo install` tracks its binaries in `$CARGO_HOME/.crates2.json`.
//! Binaries that already existed when the cache was restored were not
//! produced by this run and are removed from `$CARGO_HOME/bin` before the
//! cache is saved, so pre-installed tooling does not snowball into the
//! cache.

use crate::clean::rm;
use crate::error::GroomResult;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

#[derive(Deserialize)]
struct Crates2 {
    installs: HashMap<String, Install>,
}

#[derive(Deserialize)]
struct Install {
    bins: Vec<String>,
}

/// Binaries currently tracked by `$CARGO_HOME/.crates2.json`.
///
/// Any read or parse failure yields the empty set; grooming then falls back
/// to deleting more, never to keeping stale binaries.
pub async fn get_cargo_bins(cargo_home: &Path) -> HashSet<String> {
    let path = cargo_home.join(".crates2.json");
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                debug!("failed to read \"{}\": {}", path.display(), e);
            }
            return HashSet::new();
        }
    };
    let parsed: Crates2 = match serde_json::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("unparseable \"{}\": {}", path.display(), e);
            return HashSet::new();
        }
    };
    parsed
        .installs
        .into_values()
        .flat_map(|install| install.bins)
        .collect()
}

/// Clean `$CARGO_HOME/bin`, keeping only binaries installed by the current
/// run. `old_bins` is the set captured when the cache was restored.
pub async fn clean_bin(cargo_home: &Path, old_bins: &[String]) -> GroomResult<()> {
    let mut bins = get_cargo_bins(cargo_home).await;
    for bin in old_bins {
        bins.remove(bin);
    }

    let bin_dir = cargo_home.join("bin");
    let mut entries = match fs::read_dir(&bin_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(crate::GroomError::io(
                format!("opening bin directory {}", bin_dir.display()),
                e,
            ))
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!("failed to read entry in \"{}\": {}", bin_dir.display(), e);
                break;
            }
        };
        let is_file = entry
            .file_type()
            .await
            .map(|ft| ft.is_file())
            .unwrap_or(false);
        if is_file && !bins.contains(&entry.file_name().to_string_lossy().into_owned()) {
            rm(&entry).await;
        }
    }

    Ok(())
}
