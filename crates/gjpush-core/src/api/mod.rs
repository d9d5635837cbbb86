//! Push API: the HTTP collaborator contract, its curl implementation, and wire models.
//!
//! The upload engine only talks to [`HttpTransport`]. Request building and
//! JSON decoding for the `files/add` endpoint live in [`files`].

mod curl_client;
pub mod files;
pub mod me;
pub mod models;

pub use curl_client::CurlTransport;
pub use models::{ApiError, GameBuild, User};

use std::io::Write;

use crate::error::TransferError;

/// Raw HTTP response handed back by a transport.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Writes the file payload of a multipart request; returns bytes written.
///
/// Transports hand it a writer connected to the request body, so the writer
/// runs at network speed and its errors abort the request.
pub type ChunkWriter<'a> = dyn FnMut(&mut dyn Write) -> Result<u64, TransferError> + 'a;

/// File field of a multipart request.
pub struct FilePart<'a> {
    /// Form field name (`file` for chunk submissions).
    pub field: &'a str,
    /// File name reported in the part's Content-Disposition.
    pub file_name: &'a str,
    /// Exact payload length; the writer must produce this many bytes.
    pub len: u64,
    pub write: &'a mut ChunkWriter<'a>,
}

/// HTTP collaborator consumed by the upload engine.
///
/// Implementations resolve `path` against their base URL, append `params`
/// as the query string, and attach authorization themselves.
pub trait HttpTransport: Send + Sync {
    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<HttpResponse, TransferError>;

    fn multipart_post(
        &self,
        path: &str,
        params: &[(&str, String)],
        file: FilePart<'_>,
    ) -> Result<HttpResponse, TransferError>;
}

/// Failures of the HTTP collaborator. Surfaced as-is; never retried here.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Non-2xx status without a decodable API body.
    #[error("HTTP {0}")]
    Http(u32),

    /// A 2xx body with neither the expected field nor an error object.
    #[error("the server response carries no {0}")]
    Missing(&'static str),

    /// The server returned a body that is not the expected JSON.
    #[error("the server returned a malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<curl::Error> for TransferError {
    fn from(e: curl::Error) -> Self {
        TransferError::Transport(TransportError::Curl(e))
    }
}
