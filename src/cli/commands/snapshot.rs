//! Snapshot command - record incremental-build mtimes

use crate::cli::args::SnapshotArgs;
use crate::config::{CacheConfig, Settings};
use crate::error::{GroomError, GroomResult};
use crate::incremental::{save_mtimes, write_snapshot};
use std::path::PathBuf;

/// Execute the snapshot command
pub async fn execute(args: SnapshotArgs, settings: &Settings) -> GroomResult<()> {
    let base = std::env::current_dir()
        .map_err(|e| GroomError::io("getting current directory", e))?;
    let config = CacheConfig::new(settings, &base).await?;

    let target_dirs: Vec<PathBuf> = config
        .workspaces
        .iter()
        .map(|ws| ws.target.clone())
        .collect();
    let snapshot = save_mtimes(&target_dirs).await?;
    write_snapshot(&snapshot, &args.output).await?;

    println!(
        "Snapshotted {} incremental files under {} roots to {}",
        snapshot.times.len(),
        snapshot.roots.len(),
        args.output.display()
    );
    Ok(())
}
