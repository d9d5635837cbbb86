//! `gjpush push` – checksum a build file, then upload it chunk by chunk.
//!
//! The whole run hangs off one root controller: the control socket and
//! Ctrl-C drive it, and the checksum and upload steps each run under a child.

use anyhow::{Context, Result};
use gjpush_core::api::files::ChunkParams;
use gjpush_core::api::{me, CurlTransport, HttpTransport};
use gjpush_core::checksum;
use gjpush_core::config::PushConfig;
use gjpush_core::control::{self, run_chain, Resumable, Task};
use gjpush_core::error::TransferError;
use gjpush_core::upload::{UploadReport, Uploader};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::cli::control_socket;
use crate::cli::progress::{human_bytes, stdout_progress};
use crate::cli::require_token;

/// Arguments of one `gjpush push`.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub path: PathBuf,
    pub game_id: u64,
    pub package_id: u64,
    pub release_version: String,
    pub downloadable: bool,
    /// Overrides `chunk_size` from config.
    pub chunk_size: Option<u64>,
    pub force_restart: bool,
    pub token: Option<String>,
}

pub async fn run_push(cfg: &PushConfig, req: PushRequest) -> Result<()> {
    let token = require_token(req.token.clone())?;
    let chunk_size = req.chunk_size.unwrap_or(cfg.chunk_size);
    if chunk_size == 0 {
        anyhow::bail!("--chunk-size must be greater than zero");
    }
    let meta = std::fs::metadata(&req.path)
        .with_context(|| format!("reading {}", req.path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("{} is not a regular file", req.path.display());
    }
    let size = meta.len();
    let file_name = req
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "build".to_string());

    let http: Arc<dyn HttpTransport> = Arc::new(
        CurlTransport::new(&cfg.base_url, token)?.with_connect_timeout(cfg.connect_timeout()),
    );

    // Check the token before spending minutes on the checksum.
    let auth = Arc::clone(&http);
    let user = tokio::task::spawn_blocking(move || me::me(&*auth))
        .await
        .context("auth task failed")?
        .context("authenticating")?;
    tracing::info!(user = %user.username, "authenticated");
    println!("Hello, {}", user.name());

    let params = ChunkParams {
        game_id: req.game_id,
        package_id: req.package_id,
        release_version: req.release_version.clone(),
        downloadable: req.downloadable,
    };
    let uploader = Uploader::new(http, params, file_name.clone())
        .force_restart(req.force_restart)
        .sampler_config(cfg.sampler())
        .on_progress(stdout_progress());

    let root = Resumable::new(false);

    let listener = match control::default_control_socket_path() {
        Ok(path) => match control_socket::spawn_control_listener(root.clone(), &path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                eprintln!("warning: {:#}; pause/resume/cancel will not reach this push", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("control socket path: {}", e);
            None
        }
    };

    let interrupt = {
        let root = root.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if res.is_ok() {
                        eprintln!("\ninterrupted, cancelling");
                        root.cancel();
                    }
                }
                _ = root.done() => {}
            }
        })
    };

    tracing::info!(
        path = %req.path.display(),
        size,
        chunk_size,
        game = req.game_id,
        package = req.package_id,
        release = %req.release_version,
        "push started"
    );
    println!(
        "Pushing {} ({}) to game {}, package {}, release {}",
        file_name,
        human_bytes(size),
        req.game_id,
        req.package_id,
        req.release_version
    );

    let path = req.path.clone();
    let run_root = root.clone();
    let result = tokio::task::spawn_blocking(move || {
        upload_chain(&run_root, &uploader, path, size, chunk_size)
    })
    .await
    .context("upload task failed")?;

    // Stops the listener and the Ctrl-C task.
    root.cancel();
    interrupt.abort();
    if let Some(handle) = listener {
        let _ = handle.await;
    }

    let report = result.with_context(|| format!("pushing {}", req.path.display()))?;
    println!();
    print_report(&report);
    Ok(())
}

/// Checksum, then upload, each under its own child of `root`.
fn upload_chain(
    root: &Resumable,
    uploader: &Uploader,
    path: PathBuf,
    size: u64,
    chunk_size: u64,
) -> Result<UploadReport, TransferError> {
    let hash_ctrl = root.child(false);
    let upload_ctrl = root.child(false);
    let digest = Mutex::new(String::new());
    let report = Mutex::new(None);

    let tasks: Vec<Task<'_>> = vec![
        Box::new(|| {
            println!("Computing checksum...");
            let sum = checksum::md5_path(&hash_ctrl, &path)?;
            tracing::info!(checksum = %sum, "checksum computed");
            *digest.lock().unwrap_or_else(|e| e.into_inner()) = sum;
            Ok(())
        }),
        Box::new(|| {
            let sum = digest.lock().unwrap_or_else(|e| e.into_inner()).clone();
            let mut file = File::open(&path)?;
            let done = uploader.upload(&mut file, size, &sum, chunk_size, &upload_ctrl)?;
            *report.lock().unwrap_or_else(|e| e.into_inner()) = Some(done);
            Ok(())
        }),
    ];
    run_chain(root, tasks)?;

    report
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .ok_or(TransferError::Cancelled)
}

fn print_report(report: &UploadReport) {
    if report.start_offset > 0 {
        println!(
            "Resumed at {}; sent {} in {} chunk(s)",
            human_bytes(report.start_offset),
            human_bytes(report.bytes_transferred),
            report.chunks
        );
    } else {
        println!(
            "Sent {} in {} chunk(s)",
            human_bytes(report.bytes_transferred),
            report.chunks
        );
    }
    let build = &report.build;
    let platforms = build.platforms();
    println!(
        "Build created ({}{}){}",
        if build.kind.is_empty() { "build" } else { build.kind.as_str() },
        if build.status.is_empty() {
            String::new()
        } else {
            format!(", {}", build.status)
        },
        if platforms.is_empty() {
            String::new()
        } else {
            format!(" for {}", platforms.join(", "))
        }
    );
}
