//! Cooperative byte copy: checks the controller between fixed-size blocks.

use std::io::{self, Read, Write};

use crate::control::{Outcome, Resumable};
use crate::error::TransferError;

/// Block size between controller checkpoints.
pub const COPY_BUF_SIZE: usize = 32 * 1024;

/// Copy stopped early; `written` bytes already reached the destination.
#[derive(Debug, thiserror::Error)]
#[error("copy stopped after {written} bytes: {source}")]
pub struct CopyError {
    pub written: u64,
    #[source]
    pub source: TransferError,
}

impl From<CopyError> for TransferError {
    fn from(e: CopyError) -> Self {
        e.source
    }
}

/// Copies `src` into `dst`, calling `ctrl.wait_blocking()` before every block.
///
/// Blocks while the controller is paused and stops with `Cancelled` once it
/// is cancelled. A destination that accepts fewer bytes than offered is a
/// fatal `WriteZero` error. Returns the number of bytes written on EOF.
pub fn copy<R, W>(ctrl: &Resumable, dst: &mut W, src: &mut R) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    let fail = |written: u64, e: io::Error| CopyError {
        written,
        source: TransferError::Io(e),
    };

    loop {
        if ctrl.wait_blocking() == Outcome::Cancel {
            return Err(CopyError {
                written,
                source: TransferError::Cancelled,
            });
        }

        let nr = match src.read(&mut buf) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(fail(written, e)),
        };
        let nw = dst.write(&buf[..nr]).map_err(|e| fail(written, e))?;
        written += nw as u64;
        if nw != nr {
            return Err(fail(
                written,
                io::Error::new(io::ErrorKind::WriteZero, "short write"),
            ));
        }
    }
}
