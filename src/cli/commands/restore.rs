//! Restore command - post-restore bookkeeping
//!
//! Runs after the blob store has (maybe) restored a cache: records the
//! computed cache key and the pre-existing cargo binaries for the later
//! groom pass, and pre-cleans target directories when the cache was
//! restored under a fallback key and is known to be stale.

use crate::cli::args::RestoreArgs;
use crate::clean::{clean_target_dir, get_cargo_bins};
use crate::config::{CacheConfig, Settings};
use crate::error::{GroomError, GroomResult};
use crate::state::GroomState;
use std::path::Path;
use tracing::debug;

/// Execute the restore command
pub async fn execute(args: RestoreArgs, settings: &Settings, state_path: &Path) -> GroomResult<()> {
    let base = std::env::current_dir()
        .map_err(|e| GroomError::io("getting current directory", e))?;
    let config = CacheConfig::new(settings, &base).await?;
    config.print_info();
    println!();

    match args.matched_key.as_deref() {
        Some(matched) if matched == config.cache_key => {
            println!("Restored from cache key \"{matched}\" full match: true.");
        }
        Some(matched) => {
            println!("Restored from cache key \"{matched}\" full match: false.");
            // pre-clean the target directories on cache mismatch
            for workspace in &config.workspaces {
                if let Err(e) = clean_target_dir(&workspace.target, &[], true).await {
                    debug!("failed to pre-clean {}: {}", workspace.target.display(), e);
                }
            }
        }
        None => {
            println!("No cache found.");
        }
    }

    let mut cargo_bins: Vec<String> = get_cargo_bins(&CacheConfig::cargo_home())
        .await
        .into_iter()
        .collect();
    cargo_bins.sort();

    let state = GroomState::new(config.cache_key, args.matched_key, cargo_bins);
    state.save(state_path).await
}
