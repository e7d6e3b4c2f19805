//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// cargo-groom - Cargo cache grooming for CI
///
/// Prunes restored target directories and CARGO_HOME caches down to
/// exactly what the current dependency graph needs.
#[derive(Parser, Debug)]
#[command(name = "cargo-groom")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Settings file path
    #[arg(short, long, global = true, env = "CARGO_GROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file path (defaults to the user state directory)
    #[arg(long, global = true, env = "CARGO_GROOM_STATE")]
    pub state_file: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record post-restore state and pre-clean on a partial cache match
    Restore(RestoreArgs),

    /// Prune caches down to the current dependency graph before saving
    Groom(GroomArgs),

    /// Print the computed cache keys and the inputs they consider
    Key,

    /// Snapshot incremental-build mtimes to a file
    Snapshot(SnapshotArgs),

    /// Re-stamp incremental-build mtimes from a snapshot file
    Stamp(StampArgs),
}

/// Arguments for the restore command
#[derive(Parser, Debug)]
pub struct RestoreArgs {
    /// The cache key the blob store actually restored, if any
    #[arg(long)]
    pub matched_key: Option<String>,
}

/// Arguments for the groom command
#[derive(Parser, Debug)]
pub struct GroomArgs {
    /// Groom even when the restored cache already matches the current key
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the snapshot command
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Where to write the snapshot JSON
    #[arg(short, long, default_value = "incremental-mtimes.json")]
    pub output: PathBuf,
}

/// Arguments for the stamp command
#[derive(Parser, Debug)]
pub struct StampArgs {
    /// Snapshot file written by the snapshot command
    #[arg(default_value = "incremental-mtimes.json")]
    pub file: PathBuf,
}
