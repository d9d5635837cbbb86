//! Checksum command: compute the MD5 the push API identifies files by.

use anyhow::{Context, Result};
use gjpush_core::checksum;
use gjpush_core::control::Resumable;
use std::path::PathBuf;

/// Compute and print the MD5 of the given file.
pub async fn run_checksum(path: PathBuf) -> Result<()> {
    let target = path.clone();
    let digest = tokio::task::spawn_blocking(move || {
        checksum::md5_path(&Resumable::new(false), &target)
    })
    .await
    .context("checksum task failed")?
    .with_context(|| format!("hashing {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
