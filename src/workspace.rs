//! Workspace and dependency metadata
//!
//! A [`Workspace`] pairs a project root with its build-output directory and
//! queries `cargo metadata` for the resolved dependency graph. Packages are
//! the unit every pruning pass keys off: name, version, on-disk location,
//! and the names of emitted library targets.

use crate::error::{GroomError, GroomResult};
use crate::process::get_cmd_output;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Target kinds whose artifacts survive in `deps`
const SAVE_TARGETS: &[&str] = &["lib", "proc-macro"];

/// One resolved dependency of the current graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Package name as it appears in the registry
    pub name: String,
    /// Resolved version
    pub version: String,
    /// Directory containing the package's `Cargo.toml`
    pub path: PathBuf,
    /// Names of emitted library targets (lib and proc-macro kinds)
    pub targets: Vec<String>,
}

/// A project root plus its build-output directory
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub target: PathBuf,
}

#[derive(Deserialize)]
struct Metadata {
    packages: Vec<MetaPackage>,
}

#[derive(Deserialize)]
struct MetaPackage {
    name: String,
    version: String,
    manifest_path: PathBuf,
    targets: Vec<MetaTarget>,
}

#[derive(Deserialize)]
struct MetaTarget {
    kind: Vec<String>,
    name: String,
}

impl Workspace {
    pub fn new(root: PathBuf, target: PathBuf) -> Self {
        Self { root, target }
    }

    /// Parse a `$root -> $target` workspace spec, target defaulting to `target`
    pub fn parse_spec(spec: &str, base: &Path) -> GroomResult<Self> {
        let mut parts = spec.splitn(2, "->");
        let root = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GroomError::WorkspaceSpec(spec.to_string()))?;
        let target = parts.next().map(str::trim).unwrap_or("target");
        if target.is_empty() {
            return Err(GroomError::WorkspaceSpec(spec.to_string()));
        }

        let root = if Path::new(root).is_absolute() {
            PathBuf::from(root)
        } else {
            base.join(root)
        };
        let target = root.join(target);
        Ok(Self::new(root, target))
    }

    async fn get_packages(
        &self,
        filter: impl Fn(&MetaPackage) -> bool,
        extra_args: &[&str],
    ) -> Vec<Package> {
        let mut args = vec!["metadata", "--all-features", "--format-version", "1"];
        args.extend_from_slice(extra_args);

        debug!("collecting metadata for \"{}\"", self.root.display());
        let stdout = match get_cmd_output(
            "cargo",
            &args,
            Some(&self.root),
            &[("CARGO_ENCODED_RUSTFLAGS", "")],
        )
        .await
        {
            Ok(out) => out,
            Err(e) => {
                warn!("cargo metadata failed for {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let meta: Metadata = match serde_json::from_str(&stdout) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("unparseable cargo metadata for {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };
        debug!(
            "workspace \"{}\" has {} packages",
            self.root.display(),
            meta.packages.len()
        );

        meta.packages
            .into_iter()
            .filter(|pkg| filter(pkg))
            .map(|pkg| {
                let targets = pkg
                    .targets
                    .into_iter()
                    .filter(|t| t.kind.iter().any(|k| SAVE_TARGETS.contains(&k.as_str())))
                    .map(|t| t.name)
                    .collect();
                let path = pkg
                    .manifest_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or(pkg.manifest_path);
                Package {
                    name: pkg.name,
                    version: pkg.version,
                    path,
                    targets,
                }
            })
            .collect()
    }

    /// The dependency graph minus first-party packages.
    ///
    /// First-party packages are identified by a manifest-path prefix match
    /// against the workspace root; their artifacts are rebuilt every run and
    /// never worth caching. Metadata failures degrade to an empty list,
    /// which makes the pruning passes delete more, never keep stale data.
    pub async fn get_packages_outside_workspace_root(&self) -> Vec<Package> {
        let root = self.root.clone();
        self.get_packages(|pkg| !pkg.manifest_path.starts_with(&root), &[])
            .await
    }

    /// The workspace's own member packages
    pub async fn get_workspace_members(&self) -> Vec<Package> {
        self.get_packages(|_| true, &["--no-deps"]).await
    }
}
