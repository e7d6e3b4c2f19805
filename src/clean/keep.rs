//! Keep-set derivation
//!
//! Pure functions mapping the package list to the identifier sets that must
//! survive pruning in each directory family.

use crate::workspace::Package;
use std::collections::HashSet;

/// Raw package names, for `build` and `.fingerprint` directories and the
/// registry index cache
pub fn package_names(packages: &[Package]) -> HashSet<String> {
    packages.iter().map(|p| p.name.clone()).collect()
}

/// `{name}-{version}.crate` filenames, matched exactly against the
/// downloaded-archive cache (no suffix stripping there)
pub fn crate_filenames(packages: &[Package]) -> HashSet<String> {
    packages
        .iter()
        .map(|p| format!("{}-{}.crate", p.name, p.version))
        .collect()
}

/// Artifact stems for `deps` directories.
///
/// rustc replaces `-` with `_` when deriving file stems from package and
/// target names, and prefixes library objects with `lib`. Both forms are
/// kept for each package name and each library target name.
pub fn artifact_stems(packages: &[Package]) -> HashSet<String> {
    let mut keep = HashSet::new();
    for p in packages {
        for n in std::iter::once(&p.name).chain(p.targets.iter()) {
            let name = n.replace('-', "_");
            keep.insert(format!("lib{name}"));
            keep.insert(name);
        }
    }
    keep
}

/// `{name}-{version}` directory names for extracted `-sys` sources.
///
/// Heuristic: the `-sys` suffix is a convention, not a guarantee, but it is
/// the set of crates whose build scripts stat extracted sources and break
/// when cargo re-extracts them with fresh timestamps.
pub fn sys_source_dirs(packages: &[Package]) -> HashSet<String> {
    packages
        .iter()
        .filter(|p| p.name.ends_with("-sys"))
        .map(|p| format!("{}-{}", p.name, p.version))
        .collect()
}
