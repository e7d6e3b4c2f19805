//! Git dependency cache pruning
//!
//! Git dependencies live in two places: bare clones under
//! `$CARGO_HOME/git/db/<repo>` and checked-out refs under
//! `$CARGO_HOME/git/checkouts/<repo>/<ref>`. The clone and at least one of
//! its checkouts have to survive together; deleting either alone triggers a
//! full re-clone and rebuild on the next run, so both pruning passes work
//! from the same repo map.

use crate::clean::rm;
use crate::error::GroomResult;
use crate::workspace::Package;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Component, Path};
use tokio::fs;
use tracing::debug;

/// Prune `$CARGO_HOME/git` down to the repositories and refs the given
/// packages are checked out from
pub async fn clean_git(cargo_home: &Path, packages: &[Package]) -> GroomResult<()> {
    let co_path = cargo_home.join("git").join("checkouts");
    let db_path = cargo_home.join("git").join("db");

    let repos = repo_refs(&co_path, packages);

    // clean the db
    if let Some(mut entries) = read_dir_opt(&db_path).await {
        loop {
            let Some(entry) = next_entry(&mut entries).await else { break };
            let name = entry.file_name().to_string_lossy().into_owned();
            if !repos.contains_key(&name) {
                rm(&entry).await;
            }
        }
    }

    // clean the checkouts
    if let Some(mut entries) = read_dir_opt(&co_path).await {
        loop {
            let Some(entry) = next_entry(&mut entries).await else { break };
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(refs) = repos.get(&name) else {
                rm(&entry).await;
                continue;
            };
            let is_dir = entry
                .file_type()
                .await
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let Some(mut ref_entries) = read_dir_opt(&entry.path()).await else {
                continue;
            };
            loop {
                let Some(ref_entry) = next_entry(&mut ref_entries).await else { break };
                if !refs.contains(&ref_entry.file_name().to_string_lossy().into_owned()) {
                    rm(&ref_entry).await;
                }
            }
        }
    }

    Ok(())
}

/// Map repository-clone directory names to the set of checked-out ref
/// directories, derived from package paths under the checkouts root
fn repo_refs(co_path: &Path, packages: &[Package]) -> HashMap<String, HashSet<String>> {
    let mut repos: HashMap<String, HashSet<String>> = HashMap::new();
    for p in packages {
        let Ok(rel) = p.path.strip_prefix(co_path) else {
            continue;
        };
        let mut components = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            });
        let (Some(repo), Some(reference)) = (components.next(), components.next()) else {
            continue;
        };
        repos.entry(repo).or_default().insert(reference);
    }
    repos
}

async fn read_dir_opt(dir: &Path) -> Option<fs::ReadDir> {
    match fs::read_dir(dir).await {
        Ok(entries) => Some(entries),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                debug!("failed to open \"{}\": {}", dir.display(), e);
            }
            None
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as sync_fs;
    use tempfile::TempDir;

    fn pkg_at(path: &Path) -> Package {
        Package {
            name: "dep".to_string(),
            version: "0.1.0".to_string(),
            path: path.to_path_buf(),
            targets: vec!["dep".to_string()],
        }
    }

    fn mkdir(path: &Path) {
        sync_fs::create_dir_all(path).unwrap();
    }

    #[tokio::test]
    async fn missing_git_dirs_are_noop() {
        let home = TempDir::new().unwrap();
        clean_git(home.path(), &[]).await.unwrap();
    }

    #[tokio::test]
    async fn clone_and_checkout_survive_together() {
        let home = TempDir::new().unwrap();
        let co = home.path().join("git/checkouts");
        let db = home.path().join("git/db");
        mkdir(&db.join("reponame"));
        mkdir(&db.join("oldrepo"));
        mkdir(&co.join("reponame/refXYZ/src"));
        mkdir(&co.join("reponame/refOLD/src"));
        mkdir(&co.join("oldrepo/refAAA"));

        let packages = [pkg_at(&co.join("reponame/refXYZ"))];
        clean_git(home.path(), &packages).await.unwrap();

        assert!(db.join("reponame").exists());
        assert!(co.join("reponame/refXYZ").exists());
        assert!(!co.join("reponame/refOLD").exists());
        assert!(!db.join("oldrepo").exists());
        assert!(!co.join("oldrepo").exists());
    }

    #[tokio::test]
    async fn manifest_nested_below_ref_still_maps() {
        let home = TempDir::new().unwrap();
        let co = home.path().join("git/checkouts");
        let db = home.path().join("git/db");
        mkdir(&db.join("repo"));
        mkdir(&co.join("repo/refXYZ/crates/sub"));

        // package manifest lives in a subdirectory of the checkout
        let packages = [pkg_at(&co.join("repo/refXYZ/crates/sub"))];
        clean_git(home.path(), &packages).await.unwrap();

        assert!(db.join("repo").exists());
        assert!(co.join("repo/refXYZ").exists());
    }

    #[tokio::test]
    async fn packages_outside_checkouts_ignored() {
        let home = TempDir::new().unwrap();
        let co = home.path().join("git/checkouts");
        let db = home.path().join("git/db");
        mkdir(&db.join("repo"));
        mkdir(&co.join("repo/refXYZ"));

        // registry package, not a git checkout
        let packages = [pkg_at(Path::new("/registry/src/serde-1.0.0"))];
        clean_git(home.path(), &packages).await.unwrap();

        assert!(!db.join("repo").exists());
        assert!(!co.join("repo").exists());
    }
}
