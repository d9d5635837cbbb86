//! Chunked, resumable upload of one file.
//!
//! The server keys partial uploads by (game, size, checksum). An upload first
//! asks where the server stands, then sends `[offset, offset + chunk_size)`
//! slices until the server reports the file complete. Every offset the server
//! hands back must move forward; anything else stops the run with
//! [`TransferError::ProtocolStall`]. Network failures are returned as-is.

mod state;

pub use state::{ChunkTransferState, TransferStatus};

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::api::files::{self, ChunkParams, ChunkResponse, ChunkStatus, FileStatus};
use crate::api::{GameBuild, HttpTransport};
use crate::control::{Outcome, Resumable};
use crate::copy::copy;
use crate::error::TransferError;
use crate::sampler::{Sample, SampleCallback, SamplerConfig, SpeedSampler};

/// Upload progress, delivered on every sampler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes of the file the server has or is receiving right now.
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub sample: Sample,
}

pub type ProgressCallback = Arc<dyn Fn(&UploadProgress) + Send + Sync>;

/// Result of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub build: GameBuild,
    /// Offset the run started from (non-zero when resuming).
    pub start_offset: u64,
    /// `size - start_offset`.
    pub bytes_transferred: u64,
    /// Number of chunk requests sent.
    pub chunks: u64,
}

/// Uploads files for one (game, package, release) target.
pub struct Uploader {
    http: Arc<dyn HttpTransport>,
    params: ChunkParams,
    file_name: String,
    force_restart: bool,
    sampler: SamplerConfig,
    progress: Option<ProgressCallback>,
}

impl Uploader {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        params: ChunkParams,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            params,
            file_name: file_name.into(),
            force_restart: false,
            sampler: SamplerConfig::default(),
            progress: None,
        }
    }

    /// Ask the server to discard any partial upload of this file.
    pub fn force_restart(mut self, yes: bool) -> Self {
        self.force_restart = yes;
        self
    }

    pub fn sampler_config(mut self, config: SamplerConfig) -> Self {
        self.sampler = config;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Uploads `file` (`size` bytes, MD5 `checksum`) in `chunk_size` slices.
    ///
    /// `ctrl` is checked before the status query, at every chunk boundary and
    /// every copy block into the request body; a pause blocks the calling
    /// thread and stalls the request in flight.
    pub fn upload<F: Read + Seek>(
        &self,
        file: &mut F,
        size: u64,
        checksum: &str,
        chunk_size: u64,
        ctrl: &Resumable,
    ) -> Result<UploadReport, TransferError> {
        if chunk_size == 0 {
            return Err(
                io::Error::new(io::ErrorKind::InvalidInput, "chunk size must be non-zero").into(),
            );
        }
        checkpoint(ctrl)?;

        let remote = files::file_status(&*self.http, self.params.game_id, size, checksum)?;
        let mut state = ChunkTransferState::new(size, checksum, chunk_size);
        state.apply_remote(remote.status, remote.start)?;

        let mut restart = self.force_restart;
        match remote.status {
            FileStatus::New => tracing::info!(size, "starting new upload"),
            FileStatus::Partial => {
                tracing::info!(offset = state.offset(), size, "resuming partial upload")
            }
            FileStatus::Error => {
                tracing::warn!("server reported a broken partial upload, restarting from byte 0");
                restart = true;
            }
        }

        let start_offset = state.offset();
        let tick = self.progress.as_ref().map(|progress| {
            let progress = Arc::clone(progress);
            Arc::new(move |sample: &Sample, read: u64| {
                progress(&UploadProgress {
                    bytes_sent: (start_offset + read).min(size),
                    total_bytes: size,
                    sample: *sample,
                })
            }) as SampleCallback
        });
        // One sampler per run; running stats span every chunk.
        let mut sampled = SpeedSampler::wrap_with_callback(&mut *file, self.sampler, tick);

        let mut chunks = 0u64;
        loop {
            checkpoint(ctrl)?;

            let offset = state.offset();
            tracing::debug!(offset, len = state.next_chunk_len(), restart, "sending chunk");
            let res = self.send_chunk(&mut sampled, &state, restart, ctrl)?;
            chunks += 1;
            restart = false;

            match res.status {
                ChunkStatus::Complete => {
                    let build = res.build.ok_or_else(|| {
                        TransferError::stall(offset, "server reported completion without a build")
                    })?;
                    state.mark_complete();
                    tracing::info!(chunks, bytes = size - start_offset, "upload complete");
                    return Ok(UploadReport {
                        build,
                        start_offset,
                        bytes_transferred: size - start_offset,
                        chunks,
                    });
                }
                ChunkStatus::Error => {
                    let reason = res
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "server rejected the chunk".to_string());
                    return Err(TransferError::stall(offset, reason));
                }
                ChunkStatus::Partial => {
                    state.advance(res.start)?;
                    tracing::debug!(next = state.offset(), "chunk accepted");
                }
            }
        }
    }

    /// Streams `[offset, offset + len)` of the sampled file into one request.
    fn send_chunk<F: Read + Seek>(
        &self,
        sampled: &mut SpeedSampler<&mut F>,
        state: &ChunkTransferState,
        restart: bool,
        ctrl: &Resumable,
    ) -> Result<ChunkResponse, TransferError> {
        let offset = state.offset();
        let len = state.next_chunk_len();

        let pos = sampled.get_mut().seek(SeekFrom::Start(offset))?;
        if pos != offset {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("seek to byte {} landed at {}; has the file changed?", offset, pos),
            )
            .into());
        }

        let mut write_chunk = |dst: &mut dyn Write| -> Result<u64, TransferError> {
            let n = copy(ctrl, dst, &mut (&mut *sampled).take(len))?;
            if n != len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "read {} of {} bytes at offset {}; the file is shorter than expected",
                        n, len, offset
                    ),
                )
                .into());
            }
            Ok(n)
        };

        files::submit_chunk(
            &*self.http,
            &self.params,
            state.size(),
            state.checksum(),
            restart,
            &self.file_name,
            len,
            &mut write_chunk,
        )
    }
}

fn checkpoint(ctrl: &Resumable) -> Result<(), TransferError> {
    match ctrl.wait_blocking() {
        Outcome::Resume => Ok(()),
        Outcome::Cancel => Err(TransferError::Cancelled),
    }
}
