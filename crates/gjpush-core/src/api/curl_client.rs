//! libcurl-backed [`HttpTransport`].
//!
//! Blocking; run from `spawn_blocking` when used from async code.
//!
//! Multipart bodies are streamed: curl runs on a scoped thread and pulls the
//! body through a bounded pipe while the chunk writer fills it on the calling
//! thread. Only a few blocks are ever buffered, so the writer's pause and
//! cancel checkpoints track what actually goes out on the wire.

use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use curl::easy::{Easy, List, ReadError};
use url::Url;

use super::{FilePart, HttpResponse, HttpTransport, TransportError};
use crate::error::TransferError;

/// Payload blocks buffered between the chunk writer and curl.
const PIPE_DEPTH: usize = 4;

/// Talks to the push service under `base_url` with a fixed auth token.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    base_url: Url,
    token: String,
    user_agent: String,
    connect_timeout: Duration,
}

impl CurlTransport {
    /// `base_url` is the service root (e.g. `https://gamejolt.com`); requests
    /// go to `<base_url>/service-api/push/<path>`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, TransportError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base_url: base.join("service-api/push/")?,
            token: token.into(),
            user_agent: format!("gjpush/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str, params: &[(&str, String)]) -> Result<Url, TransportError> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn prepare(&self, url: &Url, content_type: Option<&str>) -> Result<Easy, TransportError> {
        let mut easy = Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.useragent(&self.user_agent)?;

        let mut list = List::new();
        list.append(&format!("Authorization: {}", self.token))?;
        // Suppress `Expect: 100-continue` on large multipart bodies.
        list.append("Expect:")?;
        if let Some(ct) = content_type {
            list.append(&format!("Content-Type: {}", ct))?;
        }
        easy.http_headers(list)?;
        Ok(easy)
    }

    fn perform(
        easy: &mut Easy,
        mut upload: Option<&mut BodySource>,
    ) -> Result<HttpResponse, TransportError> {
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            if let Some(source) = upload.as_deref_mut() {
                transfer.read_function(move |buf| source.fill(buf))?;
            }
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let status = easy.response_code()?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for CurlTransport {
    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<HttpResponse, TransferError> {
        let url = self.url_for(path, params)?;
        tracing::debug!(url = %url, "GET");
        let mut easy = self.prepare(&url, None)?;
        easy.get(true)?;
        Ok(Self::perform(&mut easy, None)?)
    }

    fn multipart_post(
        &self,
        path: &str,
        params: &[(&str, String)],
        file: FilePart<'_>,
    ) -> Result<HttpResponse, TransferError> {
        let url = self.url_for(path, params)?;
        let form = Multipart::new(file.field, file.file_name);
        tracing::debug!(url = %url, bytes = file.len, "POST multipart");

        let mut easy = self.prepare(&url, Some(&form.content_type()))?;
        easy.post(true)?;
        easy.post_field_size(form.content_length(file.len))?;

        let (tx, rx) = mpsc::sync_channel(PIPE_DEPTH);
        let mut source = BodySource::new(&form, rx);
        let mut pipe = BodyPipe {
            tx,
            remaining: file.len,
            closed: false,
        };

        std::thread::scope(|scope| -> Result<HttpResponse, TransferError> {
            let request = scope.spawn(move || Self::perform(&mut easy, Some(&mut source)));

            let written = (file.write)(&mut pipe);
            let complete = matches!(written, Ok(n) if n == file.len && pipe.remaining == 0);
            if !complete {
                // Fails only if the request already ended.
                let _ = pipe.tx.send(Block::Abort);
            }
            let pipe_closed = pipe.closed;
            drop(pipe);

            let sent = request
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "curl thread panicked"))?;

            match written {
                Err(TransferError::Cancelled) => Err(TransferError::Cancelled),
                // The request ended on its own; its outcome explains the closed pipe.
                Err(_) if pipe_closed => Ok(sent?),
                Err(e) => Err(e),
                Ok(n) if n != file.len => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("chunk writer produced {} of {} bytes", n, file.len),
                )
                .into()),
                Ok(_) => Ok(sent?),
            }
        })
    }
}

enum Block {
    Data(Vec<u8>),
    Abort,
}

/// Write half of the body pipe, handed to the chunk writer.
struct BodyPipe {
    tx: SyncSender<Block>,
    remaining: u64,
    /// Set once curl stopped reading.
    closed: bool,
}

impl Write for BodyPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if buf.len() as u64 > self.remaining {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk writer produced more bytes than declared",
            ));
        }
        if self.tx.send(Block::Data(buf.to_vec())).is_err() {
            self.closed = true;
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "request ended before the chunk was sent",
            ));
        }
        self.remaining -= buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read half: part headers, the piped payload, then the closing boundary.
struct BodySource {
    head: Cursor<Vec<u8>>,
    rx: Receiver<Block>,
    block: Cursor<Vec<u8>>,
    payload_done: bool,
    tail: Cursor<Vec<u8>>,
}

impl BodySource {
    fn new(form: &Multipart, rx: Receiver<Block>) -> Self {
        BodySource {
            head: Cursor::new(form.head.clone()),
            rx,
            block: Cursor::new(Vec::new()),
            payload_done: false,
            tail: Cursor::new(form.tail.clone()),
        }
    }

    /// curl read callback. Blocks until the writer hands over the next block.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let n = drain(&mut self.head, buf);
        if n > 0 {
            return Ok(n);
        }
        while !self.payload_done {
            let n = drain(&mut self.block, buf);
            if n > 0 {
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(Block::Data(data)) => self.block = Cursor::new(data),
                Ok(Block::Abort) => return Err(ReadError::Abort),
                Err(_) => self.payload_done = true,
            }
        }
        Ok(drain(&mut self.tail, buf))
    }
}

fn drain(src: &mut Cursor<Vec<u8>>, buf: &mut [u8]) -> usize {
    src.read(buf).unwrap_or(0)
}

/// One-file `multipart/form-data` framing.
struct Multipart {
    boundary: String,
    head: Vec<u8>,
    tail: Vec<u8>,
}

impl Multipart {
    fn new(field: &str, file_name: &str) -> Self {
        let boundary = new_boundary();
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary,
            quote(field),
            quote(file_name)
        )
        .into_bytes();
        let tail = format!("\r\n--{}--\r\n", boundary).into_bytes();
        Multipart {
            boundary,
            head,
            tail,
        }
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn content_length(&self, payload: u64) -> u64 {
        self.head.len() as u64 + payload + self.tail.len() as u64
    }
}

fn new_boundary() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    format!(
        "------------------------gjpush{:016x}{:04x}",
        nanos,
        SEQ.fetch_add(1, Ordering::Relaxed) & 0xffff
    )
}

/// Escapes a Content-Disposition parameter value.
fn quote(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}
