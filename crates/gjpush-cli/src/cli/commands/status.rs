//! `gjpush status` – show what the server knows about a file.

use anyhow::{Context, Result};
use gjpush_core::api::files::{self, FileStatus};
use gjpush_core::api::CurlTransport;
use gjpush_core::checksum;
use gjpush_core::config::PushConfig;
use gjpush_core::control::Resumable;
use gjpush_core::error::TransferError;
use std::path::PathBuf;

use crate::cli::progress::human_bytes;
use crate::cli::require_token;

pub async fn run_status(
    cfg: &PushConfig,
    path: PathBuf,
    game_id: u64,
    token: Option<String>,
) -> Result<()> {
    let token = require_token(token)?;
    let size = std::fs::metadata(&path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    let http =
        CurlTransport::new(&cfg.base_url, token)?.with_connect_timeout(cfg.connect_timeout());

    let target = path.clone();
    let (checksum, status) = tokio::task::spawn_blocking(move || {
        let checksum = checksum::md5_path(&Resumable::new(false), &target)?;
        let status = files::file_status(&http, game_id, size, &checksum)?;
        Ok::<_, TransferError>((checksum, status))
    })
    .await
    .context("status task failed")?
    .with_context(|| format!("querying upload state of {}", path.display()))?;

    println!("{}  {}  ({})", checksum, path.display(), human_bytes(size));
    match status.status {
        FileStatus::New => println!("not uploaded yet"),
        FileStatus::Partial => {
            let start = status.start.unwrap_or(0);
            let pct = if size == 0 {
                100.0
            } else {
                start as f64 / size as f64 * 100.0
            };
            println!(
                "partially uploaded: {} of {} ({:.1}%); `gjpush push` resumes it",
                human_bytes(start),
                human_bytes(size),
                pct
            );
        }
        FileStatus::Error => {
            println!("the server has a broken partial upload; the next push restarts it")
        }
    }
    Ok(())
}
