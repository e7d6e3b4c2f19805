//! Build-output tree reconciliation
//!
//! Walks a `target/` directory and deletes every artifact the current
//! package list does not account for. The walk distinguishes nested target
//! directories (marked by `CACHEDIR.TAG` or `.rustc_info.json`) from
//! profile directories like `debug` and `release`, and knows about the
//! independent build trees some testing frameworks nest under
//! `target/tests`.

use crate::clean::{keep, rm, rm_except};
use crate::error::{GroomError, GroomResult};
use crate::process::exists;
use crate::workspace::Package;
use std::collections::HashSet;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, warn};

/// Target trees are not expected to contain link cycles, the cap is a
/// defensive backstop only.
const MAX_DEPTH: u32 = 32;

/// Prune a build-output tree down to the given packages.
///
/// A missing tree is a no-op; any other failure to open the root
/// propagates. Failures beneath the root are logged and swallowed.
///
/// With `check_age` set, the leaf filtering switches from name matching to
/// a mtime staleness check (see [`super::rm_except`]); this is used to
/// pre-clean a stale cache restored under a fallback key.
pub async fn clean_target_dir(
    target_dir: &Path,
    packages: &[Package],
    check_age: bool,
) -> GroomResult<()> {
    clean_target_inner(target_dir, packages, check_age, 0).await
}

fn clean_target_inner<'a>(
    target_dir: &'a Path,
    packages: &'a [Package],
    check_age: bool,
    depth: u32,
) -> Pin<Box<dyn Future<Output = GroomResult<()>> + Send + 'a>> {
    Box::pin(async move {
        debug!("cleaning target directory \"{}\"", target_dir.display());
        if depth > MAX_DEPTH {
            warn!(
                "not recursing into \"{}\": nesting too deep",
                target_dir.display()
            );
            return Ok(());
        }

        let mut entries = match fs::read_dir(target_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(GroomError::io(
                    format!("opening target directory {}", target_dir.display()),
                    e,
                ))
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    debug!("failed to read entry in \"{}\": {}", target_dir.display(), e);
                    break;
                }
            };
            let is_dir = match entry.file_type().await {
                Ok(ft) => ft.is_dir(),
                Err(e) => {
                    debug!("failed to stat \"{}\": {}", entry.path().display(), e);
                    continue;
                }
            };

            if is_dir {
                let dir_name = entry.path();
                // is it a profile dir, or a nested target dir?
                let is_nested_target = exists(&dir_name.join("CACHEDIR.TAG")).await
                    || exists(&dir_name.join(".rustc_info.json")).await;

                let result = if is_nested_target {
                    clean_target_inner(&dir_name, packages, check_age, depth + 1).await
                } else {
                    clean_profile_target(&dir_name, packages, check_age, depth).await
                };
                if let Err(e) = result {
                    debug!("failed to clean \"{}\": {}", dir_name.display(), e);
                }
            } else if entry.file_name() != "CACHEDIR.TAG" {
                rm(&entry).await;
            }
        }

        Ok(())
    })
}

async fn clean_profile_target(
    profile_dir: &Path,
    packages: &[Package],
    check_age: bool,
    depth: u32,
) -> GroomResult<()> {
    debug!("cleaning profile directory \"{}\"", profile_dir.display());

    // Quite a few testing utility crates store compilation artifacts as
    // nested workspaces under `target/tests`. Notably, `target/tests/target`
    // and `target/tests/trybuild`.
    if profile_dir.file_name().is_some_and(|n| n == "tests") {
        for nested in ["target", "trybuild"] {
            let nested_dir = profile_dir.join(nested);
            if let Err(e) =
                clean_target_inner(&nested_dir, packages, check_age, depth + 1).await
            {
                debug!("failed to clean \"{}\": {}", nested_dir.display(), e);
            }
        }
        // Delete everything else.
        let keep_tests: HashSet<String> =
            ["target", "trybuild"].iter().map(|s| s.to_string()).collect();
        return rm_except(profile_dir, &keep_tests, check_age).await;
    }

    let keep_profile: HashSet<String> = ["build", ".fingerprint", "deps"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    rm_except(profile_dir, &keep_profile, false).await?;

    let keep_pkg = keep::package_names(packages);
    rm_except(&profile_dir.join("build"), &keep_pkg, check_age).await?;
    rm_except(&profile_dir.join(".fingerprint"), &keep_pkg, check_age).await?;

    let keep_deps = keep::artifact_stems(packages);
    rm_except(&profile_dir.join("deps"), &keep_deps, check_age).await?;

    Ok(())
}
