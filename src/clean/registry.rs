//! Registry cache pruning
//!
//! `$CARGO_HOME/registry` holds one directory per registry source under
//! each of `index`, `src` and `cache`, e.g.
//! `index/index.crates.io-6f17d22bba15001f`. Index metadata is pruned down
//! to the current package names; extracted sources and downloaded `.crate`
//! archives are pruned to the current graph when `prune_crate_cache` is
//! set.

use crate::clean::{keep, rm, rm_rf};
use crate::error::{GroomError, GroomResult};
use crate::process::exists;
use crate::workspace::Package;
use std::collections::HashSet;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;
use tokio::fs;
use tracing::debug;

/// Prune `$CARGO_HOME/registry` down to the given packages.
///
/// The credentials file is always deleted first; it must never end up in a
/// shared cache. With `prune_crate_cache` unset, the downloaded `.crate`
/// archives and extracted sources are all kept for future full rebuilds.
pub async fn clean_registry(
    cargo_home: &Path,
    packages: &[Package],
    prune_crate_cache: bool,
) -> GroomResult<()> {
    let credentials = cargo_home.join("credentials.toml");
    debug!("deleting \"{}\"", credentials.display());
    if let Err(e) = fs::remove_file(&credentials).await {
        if e.kind() != ErrorKind::NotFound {
            debug!("failed to delete \"{}\": {}", credentials.display(), e);
        }
    }

    // `registry/index`
    let keep_names = keep::package_names(packages);
    let mut index_dirs = open_registry_root(&cargo_home.join("registry").join("index")).await?;
    if let Some(entries) = index_dirs.as_mut() {
        loop {
            let Some(entry) = next_entry(entries).await else { break };
            let dir_path = entry.path();
            if !is_dir(&entry).await {
                continue;
            }
            // for a git registry, we can remove `.cache`, as cargo will
            // recreate it from git
            if exists(&dir_path.join(".git")).await {
                rm_rf(&dir_path.join(".cache")).await;
            } else if clean_index_cache(&dir_path.join(".cache"), &keep_names).await {
                // nothing left worth keeping
                rm_rf(&dir_path.join(".cache")).await;
            }
        }
    }

    if !prune_crate_cache {
        debug!("skipping registry cache and src cleanup");
        return Ok(());
    }

    // `registry/src`
    // Cargo usually re-creates these from the `.crate` cache below, but that
    // does not work for `-sys` crates whose build scripts check timestamps
    // to decide if rebuilds are necessary.
    let keep_src = keep::sys_source_dirs(packages);
    let mut src_dirs = open_registry_root(&cargo_home.join("registry").join("src")).await?;
    if let Some(entries) = src_dirs.as_mut() {
        loop {
            let Some(entry) = next_entry(entries).await else { break };
            if !is_dir(&entry).await {
                continue;
            }
            prune_children(&entry.path(), &keep_src, true).await;
        }
    }

    // `registry/cache`
    let keep_crates = keep::crate_filenames(packages);
    let mut cache_dirs = open_registry_root(&cargo_home.join("registry").join("cache")).await?;
    if let Some(entries) = cache_dirs.as_mut() {
        loop {
            let Some(entry) = next_entry(entries).await else { break };
            if !is_dir(&entry).await {
                continue;
            }
            prune_children(&entry.path(), &keep_crates, false).await;
        }
    }

    Ok(())
}

/// Recursively walks the sparse-index `.cache` layout, deleting metadata
/// files for packages outside the graph and any directory that becomes
/// empty. Returns whether `dir` ended up empty.
fn clean_index_cache<'a>(
    dir: &'a Path,
    keep_pkg: &'a HashSet<String>,
) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
    Box::pin(async move {
        let mut dir_is_empty = true;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("failed to open \"{}\": {}", dir.display(), e);
                return false;
            }
        };

        loop {
            let Some(entry) = next_entry(&mut entries).await else { break };
            if is_dir(&entry).await {
                if clean_index_cache(&entry.path(), keep_pkg).await {
                    rm(&entry).await;
                } else {
                    dir_is_empty = false;
                }
            } else if keep_pkg.contains(&entry.file_name().to_string_lossy().into_owned()) {
                dir_is_empty = false;
            } else {
                rm(&entry).await;
            }
        }

        dir_is_empty
    })
}

/// Delete children of `dir` whose names are not in `keep`, exact match.
/// With `dirs_only` set, plain files are left alone.
async fn prune_children(dir: &Path, keep: &HashSet<String>, dirs_only: bool) {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("failed to open \"{}\": {}", dir.display(), e);
            return;
        }
    };
    loop {
        let Some(entry) = next_entry(&mut entries).await else { break };
        if dirs_only != is_dir(&entry).await {
            continue;
        }
        if !keep.contains(&entry.file_name().to_string_lossy().into_owned()) {
            rm(&entry).await;
        }
    }
}

/// Open one of the per-registry roots; absent roots are a no-op
async fn open_registry_root(dir: &Path) -> GroomResult<Option<fs::ReadDir>> {
    match fs::read_dir(dir).await {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GroomError::io(
            format!("opening registry directory {}", dir.display()),
            e,
        )),
    }
}

async fn next_entry(entries: &mut fs::ReadDir) -> Option<fs::DirEntry> {
    match entries.next_entry().await {
        Ok(next) => next,
        Err(e) => {
            debug!("failed to read directory entry: {}", e);
            None
        }
    }
}

async fn is_dir(entry: &fs::DirEntry) -> bool {
    entry
        .file_type()
        .await
        .map(|ft| ft.is_dir())
        .unwrap_or(false)
}
