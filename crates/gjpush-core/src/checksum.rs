//! File checksum used to identify an upload on the remote side.
//!
//! The push API keys partial uploads by (size, MD5). Hashing a large build
//! takes a while, so it goes through the cooperative copy and honors
//! pause/cancel like the transfer itself.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::control::Resumable;
use crate::copy::copy;
use crate::error::TransferError;

/// Adapts a digest to `io::Write` so it can be a copy destination.
struct DigestWriter<'a, D: Digest>(&'a mut D);

impl<D: Digest> Write for DigestWriter<'_, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compute the MD5 of a file as lowercase hex, checking `ctrl` every block.
pub fn md5_path(ctrl: &Resumable, path: &Path) -> Result<String, TransferError> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let n = copy(ctrl, &mut DigestWriter(&mut hasher), &mut file)?;
    tracing::debug!(path = %path.display(), bytes = n, "checksum computed");
    Ok(hex::encode(hasher.finalize()))
}
