//! Key command - print the computed cache keys

use crate::config::{CacheConfig, Settings};
use crate::error::{GroomError, GroomResult};

/// Execute the key command
pub async fn execute(settings: &Settings) -> GroomResult<()> {
    let base = std::env::current_dir()
        .map_err(|e| GroomError::io("getting current directory", e))?;
    let config = CacheConfig::new(settings, &base).await?;
    config.print_info();
    Ok(())
}
