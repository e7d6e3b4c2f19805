//! Stamp command - re-apply incremental-build mtimes after a restore

use crate::cli::args::StampArgs;
use crate::error::GroomResult;
use crate::incremental::{read_snapshot, restore_mtimes};

/// Execute the stamp command
pub async fn execute(args: StampArgs) -> GroomResult<()> {
    let snapshot = read_snapshot(&args.file).await?;
    restore_mtimes(&snapshot);
    println!(
        "Re-stamped {} incremental files from {}",
        snapshot.times.len(),
        args.file.display()
    );
    Ok(())
}
