//! Cache configuration and key computation
//!
//! A [`CacheConfig`] captures everything a run depends on: the workspaces
//! to groom, the paths a blob store would archive, and the cache keys. The
//! primary key covers the toolchain, relevant environment variables and the
//! lockfile state; the restore key drops the lockfile portion so a stale
//! cache can still be restored and pre-cleaned.

use crate::error::{GroomError, GroomResult};
use crate::process::{exists, get_cmd_output};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const HASH_LENGTH: usize = 8;
const DEFAULT_PREFIX: &str = "v1-rust";

/// Env var prefixes that cover most compiler / cargo configuration
const ENV_PREFIXES: &[&str] = &["CARGO", "CC", "CFLAGS", "CXX", "CMAKE", "RUST"];

/// User-facing settings, loadable from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix portion of the cache key
    pub prefix_key: Option<String>,
    /// Shared key, overriding the per-project key portion
    pub shared_key: Option<String>,
    /// Additional key portion (ignored when `shared_key` is set)
    pub key: Option<String>,
    /// Extra env var prefixes to consider for the key
    pub env_vars: Vec<String>,
    /// Workspace specs, `$root -> $target` with target defaulting to `target`
    pub workspaces: Vec<String>,
    /// Whether to cache workspace target directories
    pub cache_targets: bool,
    /// Extra directories to cache
    pub cache_directories: Vec<PathBuf>,
    /// Whether to cache `$CARGO_HOME/bin` and the install manifests
    pub cache_bin: bool,
    /// Keep all downloaded crates instead of pruning to the graph
    pub cache_all_crates: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix_key: None,
            shared_key: None,
            key: None,
            env_vars: Vec::new(),
            workspaces: vec![".".to_string()],
            cache_targets: true,
            cache_directories: Vec::new(),
            cache_bin: true,
            cache_all_crates: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, or defaults when `path` is `None`
    pub async fn load(path: Option<&Path>) -> GroomResult<Self> {
        let Some(path) = path else {
            debug!("no settings file, using defaults");
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| GroomError::io(format!("reading settings from {}", path.display()), e))?;
        toml::from_str(&content).map_err(|e| GroomError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Everything one grooming run depends on
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// All the paths we want to cache
    pub cache_paths: Vec<PathBuf>,
    /// The primary cache key
    pub cache_key: String,
    /// The secondary (restore) key that only contains the prefix and environment
    pub restore_key: String,
    /// Whether to cache `$CARGO_HOME/bin`
    pub cache_bin: bool,
    /// Whether to prune the crate cache down to the graph
    pub prune_crate_cache: bool,
    /// The workspace configurations
    pub workspaces: Vec<Workspace>,
    /// The prefix portion of the cache key
    pub key_prefix: String,
    /// The rust version considered for the cache key
    pub key_rust: String,
    /// The environment variables considered for the cache key
    pub key_envs: Vec<String>,
    /// The files considered for the cache key
    pub key_files: Vec<PathBuf>,
}

impl CacheConfig {
    /// `$CARGO_HOME`, defaulting to `~/.cargo`
    pub fn cargo_home() -> PathBuf {
        std::env::var_os("CARGO_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".cargo")
            })
    }

    /// Construct a [`CacheConfig`] with all the paths and keys.
    ///
    /// Runs `rustc` and `cargo metadata`, reads manifests and lockfiles,
    /// and resolves workspace specs relative to `base`.
    pub async fn new(settings: &Settings, base: &Path) -> GroomResult<Self> {
        // Construct the key prefix from the configured key portions plus OS
        // and CPU architecture, to avoid cross-contamination of caches.
        let mut key = settings
            .prefix_key
            .clone()
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        if let Some(shared) = &settings.shared_key {
            key += &format!("-{shared}");
        } else if let Some(extra) = &settings.key {
            key += &format!("-{extra}");
        }
        key += &format!("-{}-{}", std::env::consts::OS, std::env::consts::ARCH);
        let key_prefix = key.clone();

        // Environment portion: the rustc version plus all matching env vars,
        // sorted for a stable hash.
        let mut hasher = Sha256::new();
        let rust_version = get_rust_version().await?;
        let release = rust_version.get("release").cloned().unwrap_or_default();
        let host = rust_version.get("host").cloned().unwrap_or_default();
        let commit = rust_version.get("commit-hash").cloned().unwrap_or_default();
        hasher.update(format!("{release} {host}"));
        hasher.update(&commit);
        let key_rust = format!("{release} {host} ({commit})");

        let mut env_vars: Vec<(String, String)> = std::env::vars().collect();
        env_vars.sort_by(|a, b| a.0.cmp(&b.0));
        let key_envs = hash_env(&mut hasher, &settings.env_vars, &env_vars);

        key += &format!("-{}", digest(hasher));
        let restore_key = key.clone();

        // Workspaces use a `$root -> $target` syntax.
        let mut workspaces = Vec::new();
        for spec in &settings.workspaces {
            workspaces.push(Workspace::parse_spec(spec, base)?);
        }

        // Lockfile portion: toolchain files hashed raw, manifests and
        // lockfiles hashed structurally where they parse.
        let mut hasher = Sha256::new();
        let mut key_files = Vec::new();
        let mut parsed_key_files = Vec::new();

        for workspace in &workspaces {
            for name in [".cargo/config.toml", "rust-toolchain", "rust-toolchain.toml"] {
                let path = workspace.root.join(name);
                if exists(&path).await {
                    key_files.push(path);
                }
            }

            let members = workspace.get_workspace_members().await;
            let mut manifests: Vec<PathBuf> =
                members.iter().map(|m| m.path.join("Cargo.toml")).collect();
            manifests.sort();
            manifests.dedup();
            for manifest in manifests {
                match fs::read_to_string(&manifest).await {
                    Ok(content) => match normalize_manifest(&content) {
                        Ok(normalized) => {
                            hasher.update(normalized);
                            parsed_key_files.push(manifest);
                        }
                        Err(e) => {
                            warn!(
                                "Error parsing manifest {}, fallback to hashing entire file: {}",
                                manifest.display(),
                                e
                            );
                            key_files.push(manifest);
                        }
                    },
                    Err(e) => {
                        debug!("failed to read \"{}\": {}", manifest.display(), e);
                    }
                }
            }

            let cargo_lock = workspace.root.join("Cargo.lock");
            if exists(&cargo_lock).await {
                let content = fs::read_to_string(&cargo_lock).await.map_err(|e| {
                    GroomError::io(format!("reading {}", cargo_lock.display()), e)
                })?;
                match normalize_lockfile(&content) {
                    Some(normalized) => {
                        hasher.update(normalized);
                        parsed_key_files.push(cargo_lock);
                    }
                    None => {
                        warn!(
                            "Unsupported or unparseable {}, fallback to hashing entire file",
                            cargo_lock.display()
                        );
                        key_files.push(cargo_lock);
                    }
                }
            }
        }

        key_files.sort();
        key_files.dedup();
        for file in &key_files {
            let content = fs::read(file)
                .await
                .map_err(|e| GroomError::io(format!("reading {}", file.display()), e))?;
            hasher.update(&content);
        }
        let lock_hash = digest(hasher);

        key_files.extend(parsed_key_files);
        key_files.sort();
        key_files.dedup();

        key += &format!("-{lock_hash}");
        let cache_key = key;

        // Paths a blob store would archive alongside this key.
        let cargo_home = Self::cargo_home();
        let mut cache_paths = vec![cargo_home.join("registry"), cargo_home.join("git")];
        if settings.cache_bin {
            cache_paths = [
                cargo_home.join("bin"),
                cargo_home.join(".crates.toml"),
                cargo_home.join(".crates2.json"),
            ]
            .into_iter()
            .chain(cache_paths)
            .collect();
        }
        if settings.cache_targets {
            cache_paths.extend(workspaces.iter().map(|ws| ws.target.clone()));
        }
        cache_paths.extend(settings.cache_directories.iter().cloned());

        Ok(Self {
            cache_paths,
            cache_key,
            restore_key,
            cache_bin: settings.cache_bin,
            prune_crate_cache: !settings.cache_all_crates,
            workspaces,
            key_prefix,
            key_rust,
            key_envs,
            key_files,
        })
    }

    /// Print the configuration, mirroring what the keys were derived from
    pub fn print_info(&self) {
        println!("Workspaces:");
        for workspace in &self.workspaces {
            println!("    {}", workspace.root.display());
        }
        println!("Cache Paths:");
        for path in &self.cache_paths {
            println!("    {}", path.display());
        }
        println!("Restore Key:");
        println!("    {}", self.restore_key);
        println!("Cache Key:");
        println!("    {}", self.cache_key);
        println!(".. Prefix:");
        println!("  - {}", self.key_prefix);
        println!(".. Environment considered:");
        println!("  - Rust Version: {}", self.key_rust);
        for env in &self.key_envs {
            println!("  - {env}");
        }
        println!(".. Lockfiles considered:");
        for file in &self.key_files {
            println!("  - {}", file.display());
        }
    }
}

/// Hash all env vars matching the default or extra prefixes into `hasher`,
/// returning the names that were considered
fn hash_env(
    hasher: &mut Sha256,
    extra_prefixes: &[String],
    sorted_vars: &[(String, String)],
) -> Vec<String> {
    let mut key_envs = Vec::new();
    for (key, value) in sorted_vars {
        let matches = ENV_PREFIXES.iter().any(|p| key.starts_with(p))
            || extra_prefixes.iter().any(|p| key.starts_with(p.as_str()));
        if matches && !value.is_empty() {
            hasher.update(format!("{key}={value}"));
            key_envs.push(key.clone());
        }
    }
    key_envs
}

/// Parse a manifest and zero out the volatile fields: the package version,
/// and the version/path of path dependencies. Returns a canonical JSON
/// rendering for hashing.
fn normalize_manifest(content: &str) -> GroomResult<String> {
    let mut parsed: toml::Value = toml::from_str(content)?;

    if let Some(package) = parsed.get_mut("package").and_then(|v| v.as_table_mut()) {
        if package.contains_key("version") {
            package.insert("version".to_string(), toml::Value::String("0.0.0".into()));
        }
    }

    for prefix in ["", "build-", "dev-"] {
        let section = format!("{prefix}dependencies");
        let Some(deps) = parsed.get_mut(section.as_str()).and_then(|v| v.as_table_mut()) else {
            continue;
        };
        for (_, dep) in deps.iter_mut() {
            // Not a table, probably a plain version string.
            let Some(dep) = dep.as_table_mut() else { continue };
            if dep.contains_key("path") {
                dep.insert("version".to_string(), toml::Value::String("0.0.0".into()));
                dep.insert("path".to_string(), toml::Value::String(String::new()));
            }
        }
    }

    Ok(serde_json::to_string(&parsed)?)
}

/// Parse a lockfile and render just the third-party packages (those with a
/// `source` or `checksum`) as canonical JSON. `None` means the lockfile
/// format is unsupported and the whole file should be hashed instead.
fn normalize_lockfile(content: &str) -> Option<String> {
    let parsed: toml::Value = toml::from_str(content).ok()?;
    let version = parsed.get("version").and_then(|v| v.as_integer())?;
    if version != 3 && version != 4 {
        return None;
    }
    let packages = parsed.get("package")?.as_array()?;
    // Packages without `source` and `checksum` are the `path = "..."`
    // crates within the workspace.
    let third_party: Vec<&toml::Value> = packages
        .iter()
        .filter(|p| p.get("source").is_some() || p.get("checksum").is_some())
        .collect();
    serde_json::to_string(&third_party).ok()
}

fn digest(hasher: Sha256) -> String {
    let result = hasher.finalize();
    hex::encode(&result[..HASH_LENGTH / 2])
}

async fn get_rust_version() -> GroomResult<HashMap<String, String>> {
    let stdout = get_cmd_output("rustc", &["-vV"], None, &[]).await?;
    Ok(stdout
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cargo_home_respects_env() {
        let prev = std::env::var_os("CARGO_HOME");
        std::env::set_var("CARGO_HOME", "/opt/cargo");
        assert_eq!(CacheConfig::cargo_home(), PathBuf::from("/opt/cargo"));
        match prev {
            Some(v) => std::env::set_var("CARGO_HOME", v),
            None => std::env::remove_var("CARGO_HOME"),
        }
    }

    #[test]
    fn settings_default_workspace() {
        let settings = Settings::default();
        assert_eq!(settings.workspaces, vec![".".to_string()]);
        assert!(settings.cache_targets);
        assert!(settings.cache_bin);
        assert!(!settings.cache_all_crates);
    }

    #[test]
    fn settings_parse_toml() {
        let settings: Settings = toml::from_str(
            r#"
            shared_key = "ci"
            workspaces = [". -> target", "crates/api"]
            cache_all_crates = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.shared_key.as_deref(), Some("ci"));
        assert_eq!(settings.workspaces.len(), 2);
        assert!(settings.cache_all_crates);
    }

    #[test]
    fn env_hash_filters_and_sorts() {
        let vars = vec![
            ("CARGO_TERM_COLOR".to_string(), "always".to_string()),
            ("HOME".to_string(), "/root".to_string()),
            ("MY_FLAG".to_string(), "1".to_string()),
            ("RUSTFLAGS".to_string(), "-Dwarnings".to_string()),
        ];
        let mut hasher = Sha256::new();
        let envs = hash_env(&mut hasher, &[], &vars);
        assert_eq!(envs, vec!["CARGO_TERM_COLOR", "RUSTFLAGS"]);

        let mut hasher = Sha256::new();
        let envs = hash_env(&mut hasher, &["MY_".to_string()], &vars);
        assert_eq!(envs, vec!["CARGO_TERM_COLOR", "MY_FLAG", "RUSTFLAGS"]);
    }

    #[test]
    fn env_hash_changes_with_value() {
        let mut h1 = Sha256::new();
        let mut h2 = Sha256::new();
        hash_env(
            &mut h1,
            &[],
            &[("RUSTFLAGS".to_string(), "-Dwarnings".to_string())],
        );
        hash_env(&mut h2, &[], &[("RUSTFLAGS".to_string(), "".to_string())]);
        assert_ne!(digest(h1), digest(h2));
    }

    #[test]
    fn manifest_normalization_zeroes_versions() {
        let a = normalize_manifest(
            r#"
            [package]
            name = "demo"
            version = "0.1.0"

            [dependencies]
            serde = "1.0"
            local = { path = "../local", version = "0.1.0" }
            "#,
        )
        .unwrap();
        let b = normalize_manifest(
            r#"
            [package]
            name = "demo"
            version = "0.2.0"

            [dependencies]
            serde = "1.0"
            local = { path = "../elsewhere/local", version = "0.2.0" }
            "#,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn manifest_normalization_keeps_registry_deps() {
        let a = normalize_manifest("[dependencies]\nserde = \"1.0\"\n").unwrap();
        let b = normalize_manifest("[dependencies]\nserde = \"1.1\"\n").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn lockfile_normalization_drops_workspace_members() {
        let lock = r#"
            version = 3

            [[package]]
            name = "my-crate"
            version = "0.1.0"

            [[package]]
            name = "serde"
            version = "1.0.200"
            source = "registry+https://github.com/rust-lang/crates.io-index"
            checksum = "deadbeef"
        "#;
        let normalized = normalize_lockfile(lock).unwrap();
        assert!(normalized.contains("serde"));
        assert!(!normalized.contains("my-crate"));
    }

    #[test]
    fn lockfile_normalization_rejects_old_formats() {
        assert!(normalize_lockfile("version = 2\n[[package]]\nname = \"x\"\n").is_none());
        assert!(normalize_lockfile("not toml at all [").is_none());
    }

    #[test]
    fn digest_is_truncated_hex() {
        let hasher = Sha256::new();
        let d = digest(hasher);
        assert_eq!(d.len(), HASH_LENGTH);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
