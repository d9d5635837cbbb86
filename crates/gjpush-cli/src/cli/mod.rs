//! CLI for gjpush.

mod commands;
mod control_socket;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gjpush_core::config;
use gjpush_core::error::TransferError;
use std::path::PathBuf;

use commands::{
    run_cancel, run_checksum, run_pause, run_push, run_resume, run_status, PushRequest,
};

/// Top-level CLI for gjpush.
#[derive(Debug, Parser)]
#[command(name = "gjpush")]
#[command(about = "gjpush: resumable chunked uploads of game builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload a build file to a game package release. Resumes a previous partial upload.
    Push {
        /// Path to the build file.
        path: PathBuf,
        /// Game ID.
        #[arg(short, long = "game", value_name = "ID")]
        game: u64,
        /// Package ID within the game.
        #[arg(short, long = "package", value_name = "ID")]
        package: u64,
        /// Release version the build is attached to, as semver (e.g. 1.2.0).
        #[arg(short, long = "release", value_name = "VERSION")]
        release: semver::Version,
        /// Upload as a browser build instead of a downloadable one.
        #[arg(long)]
        browser: bool,
        /// Bytes per chunk request (default from config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,
        /// Discard any partial upload of this file on the server and start over.
        #[arg(long)]
        force_restart: bool,
        /// API token.
        #[arg(long, env = "GJPUSH_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Show what the server knows about a file (new, partial or broken).
    Status {
        /// Path to the build file.
        path: PathBuf,
        /// Game ID.
        #[arg(short, long = "game", value_name = "ID")]
        game: u64,
        /// API token.
        #[arg(long, env = "GJPUSH_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Compute the MD5 the server uses to identify a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Pause the running push.
    Pause,

    /// Resume the paused push.
    Resume,

    /// Cancel the running push.
    Cancel,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Push {
                path,
                game,
                package,
                release,
                browser,
                chunk_size,
                force_restart,
                token,
            } => {
                let req = PushRequest {
                    path,
                    game_id: game,
                    package_id: package,
                    release_version: release.to_string(),
                    downloadable: !browser,
                    chunk_size,
                    force_restart,
                    token,
                };
                run_push(&cfg, req).await?
            }
            CliCommand::Status { path, game, token } => {
                run_status(&cfg, path, game, token).await?
            }
            CliCommand::Checksum { path } => run_checksum(path).await?,
            CliCommand::Pause => run_pause().await?,
            CliCommand::Resume => run_resume().await?,
            CliCommand::Cancel => run_cancel().await?,
        }

        Ok(())
    }
}

/// True when the error chain carries a deliberate cancellation.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<TransferError>()
            .map_or(false, TransferError::is_cancelled)
    })
}

/// Token from `--token` / `GJPUSH_TOKEN`, rejecting empty values.
fn require_token(token: Option<String>) -> Result<String> {
    match token.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => anyhow::bail!("missing API token: pass --token or set GJPUSH_TOKEN"),
    }
}

#[cfg(test)]
mod tests;
