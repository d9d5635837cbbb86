//! Error taxonomy for transfers.
//!
//! Every error bubbles synchronously to the caller of the upload engine; none
//! are retried here. `Cancelled` is kept distinct so the CLI can stay quiet on
//! a deliberate interruption.

use crate::api::{ApiError, TransportError};

/// Errors produced by the transfer core.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The controller yielded `Cancel` at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,

    /// The remote side reported `error` for a chunk, or did not advance the offset.
    #[error(
        "upload stalled at byte {offset}: {reason} (the file may have changed while uploading, \
         or the upload session expired; restart the upload)"
    )]
    ProtocolStall { offset: u64, reason: String },

    /// Local file open/seek/read failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The HTTP collaborator failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with its error object.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl TransferError {
    /// True when the error is a deliberate interruption rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }

    pub(crate) fn stall(offset: u64, reason: impl Into<String>) -> Self {
        TransferError::ProtocolStall {
            offset,
            reason: reason.into(),
        }
    }
}
