//! Groom command - the save-phase pruning pass
//!
//! Runs every pruning pass against the restored cache, in the order the
//! save path wants them: target directories first (per workspace), then
//! the registry, installed binaries, and the git caches. Individual pass
//! failures are logged and never abort the run; the worst outcome is a
//! larger cache.

use crate::cli::args::GroomArgs;
use crate::clean::{clean_bin, clean_git, clean_registry, clean_target_dir};
use crate::config::{CacheConfig, Settings};
use crate::error::{GroomError, GroomResult};
use crate::state::GroomState;
use std::path::Path;
use tracing::debug;

/// Execute the groom command
pub async fn execute(args: GroomArgs, settings: &Settings, state_path: &Path) -> GroomResult<()> {
    let base = std::env::current_dir()
        .map_err(|e| GroomError::io("getting current directory", e))?;
    let config = CacheConfig::new(settings, &base).await?;

    let state = GroomState::load(state_path).await.ok();
    if !args.force {
        if let Some(state) = &state {
            if state.is_up_to_date(&config.cache_key) {
                println!("Cache up-to-date.");
                return Ok(());
            }
        }
    }

    config.print_info();
    println!();

    let cargo_home = CacheConfig::cargo_home();
    let mut all_packages = Vec::new();

    for workspace in &config.workspaces {
        let packages = workspace.get_packages_outside_workspace_root().await;
        println!("... Cleaning {} ...", workspace.target.display());
        if let Err(e) = clean_target_dir(&workspace.target, &packages, false).await {
            debug!("failed to clean {}: {}", workspace.target.display(), e);
        }
        all_packages.extend(packages);
    }

    println!(
        "... Cleaning cargo registry (prune crate cache: {}) ...",
        config.prune_crate_cache
    );
    if let Err(e) = clean_registry(&cargo_home, &all_packages, config.prune_crate_cache).await {
        debug!("failed to clean registry: {}", e);
    }

    if config.cache_bin {
        println!("... Cleaning cargo/bin ...");
        let old_bins = state.as_ref().map(|s| s.cargo_bins.clone()).unwrap_or_default();
        if let Err(e) = clean_bin(&cargo_home, &old_bins).await {
            debug!("failed to clean cargo/bin: {}", e);
        }
    }

    println!("... Cleaning cargo git cache ...");
    if let Err(e) = clean_git(&cargo_home, &all_packages).await {
        debug!("failed to clean git cache: {}", e);
    }

    println!();
    println!("Groomed cache ready to save:");
    println!("    key: {}", config.cache_key);
    for path in &config.cache_paths {
        println!("    {}", path.display());
    }

    Ok(())
}
