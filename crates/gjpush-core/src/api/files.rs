//! `files/add`: remote upload state and chunk submission.

use std::io::Write;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::models::{ApiError, GameBuild};
use super::{FilePart, HttpResponse, HttpTransport, TransportError};
use crate::error::TransferError;

const FILES_ADD: &str = "files/add";

/// Remote state of a file identified by (game, size, checksum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    New,
    Partial,
    Error,
}

/// Outcome of one chunk submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Partial,
    Complete,
    Error,
}

/// Body of `GET files/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: FileStatus,
    #[serde(default)]
    pub file_id: Option<u64>,
    /// Next byte the server expects (partial uploads).
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Body of `POST files/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkResponse {
    pub status: ChunkStatus,
    #[serde(default)]
    pub file_id: Option<u64>,
    #[serde(default)]
    pub start: Option<u64>,
    /// Only present on the response that completes the file.
    #[serde(default)]
    pub build: Option<GameBuild>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Wire form of both bodies. Error objects may arrive without a `status`.
/// Missing `Option` fields decode as `None`.
#[derive(Debug, Deserialize)]
struct RawResponse<S> {
    status: Option<S>,
    file_id: Option<u64>,
    start: Option<u64>,
    build: Option<GameBuild>,
    error: Option<ApiError>,
}

impl<S> RawResponse<S> {
    /// The status, or what to report when the server sent none.
    fn require_status(&mut self, res: &HttpResponse) -> Result<S, TransportError> {
        self.status.take().ok_or(if res.is_success() {
            TransportError::Missing("status")
        } else {
            TransportError::Http(res.status)
        })
    }
}

/// Query parameters for a chunk submission that stay fixed for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkParams {
    pub game_id: u64,
    pub package_id: u64,
    pub release_version: String,
    /// Downloadable build (true) or browser build (false).
    pub downloadable: bool,
}

fn flag(b: bool) -> String {
    String::from(if b { "1" } else { "0" })
}

/// Decodes an API body. A non-2xx response whose body is not the expected
/// JSON is reported as the HTTP status instead.
pub(crate) fn decode<T: DeserializeOwned>(res: &HttpResponse) -> Result<T, TransportError> {
    match serde_json::from_slice(&res.body) {
        Ok(v) => Ok(v),
        Err(_) if !res.is_success() => Err(TransportError::Http(res.status)),
        Err(e) => Err(TransportError::Decode(e)),
    }
}

/// Asks the server what it knows about the file.
///
/// An error object in the body is returned as [`TransferError::Api`].
pub fn file_status(
    http: &dyn HttpTransport,
    game_id: u64,
    size: u64,
    checksum: &str,
) -> Result<StatusResponse, TransferError> {
    let params = [
        ("game_id", game_id.to_string()),
        ("size", size.to_string()),
        ("checksum", checksum.to_string()),
    ];
    let res = http.get(FILES_ADD, &params)?;
    let mut raw: RawResponse<FileStatus> = decode(&res)?;
    if let Some(err) = raw.error.take() {
        return Err(TransferError::Api(err));
    }
    Ok(StatusResponse {
        status: raw.require_status(&res)?,
        file_id: raw.file_id,
        start: raw.start,
        error: None,
    })
}

/// Sends one chunk of `len` bytes. `write` streams the payload into the
/// request body and must produce exactly `len` bytes.
///
/// The decoded response is returned as-is, including `error` statuses; the
/// caller decides what is fatal. An error object without a status is
/// reported as [`ChunkStatus::Error`].
pub fn submit_chunk(
    http: &dyn HttpTransport,
    params: &ChunkParams,
    size: u64,
    checksum: &str,
    restart: bool,
    file_name: &str,
    len: u64,
    write: &mut dyn FnMut(&mut dyn Write) -> Result<u64, TransferError>,
) -> Result<ChunkResponse, TransferError> {
    let query = [
        ("game_id", params.game_id.to_string()),
        ("package_id", params.package_id.to_string()),
        ("release_version", params.release_version.clone()),
        ("downloadable", flag(params.downloadable)),
        ("size", size.to_string()),
        ("checksum", checksum.to_string()),
        ("restart", flag(restart)),
    ];
    let res = http.multipart_post(
        FILES_ADD,
        &query,
        FilePart {
            field: "file",
            file_name,
            len,
            write,
        },
    )?;
    let mut raw: RawResponse<ChunkStatus> = decode(&res)?;
    let status = match raw.error {
        Some(_) => raw.status.take().unwrap_or(ChunkStatus::Error),
        None => raw.require_status(&res)?,
    };
    Ok(ChunkResponse {
        status,
        file_id: raw.file_id,
        start: raw.start,
        build: raw.build,
        error: raw.error,
    })
}
