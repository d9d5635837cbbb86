//! Per-run bookkeeping for a chunked upload.

use crate::api::files::FileStatus;
use crate::error::TransferError;

/// Where the upload stands. Mirrors the remote vocabulary plus `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    New,
    Partial,
    Error,
    Complete,
}

impl From<FileStatus> for TransferStatus {
    fn from(s: FileStatus) -> Self {
        match s {
            FileStatus::New => TransferStatus::New,
            FileStatus::Partial => TransferStatus::Partial,
            FileStatus::Error => TransferStatus::Error,
        }
    }
}

/// Offset tracking for one upload attempt. The offset never moves backwards
/// and the chunk size never changes once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTransferState {
    size: u64,
    checksum: String,
    offset: u64,
    status: TransferStatus,
    chunk_size: u64,
}

impl ChunkTransferState {
    pub fn new(size: u64, checksum: impl Into<String>, chunk_size: u64) -> Self {
        Self {
            size,
            checksum: checksum.into(),
            offset: 0,
            status: TransferStatus::New,
            chunk_size,
        }
    }

    /// Applies the remote status. `partial` resumes at `start`; `error`
    /// starts over from byte 0.
    pub fn apply_remote(
        &mut self,
        status: FileStatus,
        start: Option<u64>,
    ) -> Result<(), TransferError> {
        self.status = status.into();
        match status {
            FileStatus::New | FileStatus::Error => self.offset = 0,
            FileStatus::Partial => {
                let start = start.unwrap_or(0);
                if start > self.size {
                    return Err(TransferError::stall(
                        start,
                        format!("server expects byte {} of a {} byte file", start, self.size),
                    ));
                }
                self.offset = start;
            }
        }
        Ok(())
    }

    /// Moves to the offset the server returned for the chunk just sent.
    /// Anything not strictly ahead of the current offset, or past the end,
    /// is a stall.
    pub fn advance(&mut self, next: Option<u64>) -> Result<(), TransferError> {
        let next = match next {
            Some(n) if n > self.offset => n,
            _ => {
                return Err(TransferError::stall(
                    self.offset,
                    "server did not advance the upload offset",
                ))
            }
        };
        if next > self.size {
            return Err(TransferError::stall(
                self.offset,
                format!("server offset {} is past the end of the file", next),
            ));
        }
        self.offset = next;
        self.status = TransferStatus::Partial;
        Ok(())
    }

    pub fn mark_complete(&mut self) {
        self.status = TransferStatus::Complete;
    }

    /// Bytes to send in the next chunk.
    pub fn next_chunk_len(&self) -> u64 {
        self.chunk_size.min(self.size - self.offset)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }
}
