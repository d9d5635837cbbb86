//! Minimal HTTP/1.1 server speaking the `files/add` push protocol for integration tests.
//!
//! Keeps one file's received bytes in memory. `GET` reports new/partial/error,
//! `POST` appends the multipart `file` part and answers partial or complete.
//! On completion the MD5 of the received bytes must match the `checksum` query.
//! `GET me` answers with a fixed user.

use md5::{Digest, Md5};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const TOKEN: &str = "test-token";

#[derive(Debug, Default)]
pub struct ServerState {
    /// Bytes received so far for the file.
    pub received: Vec<u8>,
    /// Report `error` on the status query until a chunk arrives with `restart=1`.
    pub broken: bool,
    /// Answer this many chunks normally, then stop advancing the offset.
    pub stall_after: Option<usize>,
    /// Query of every chunk request, in order.
    pub chunk_queries: Vec<HashMap<String, String>>,
    pub status_queries: usize,
}

pub struct PushServer {
    pub base_url: String,
    pub state: Arc<Mutex<ServerState>>,
    /// Request body bytes read off the wire so far, across all requests.
    pub body_bytes: Arc<AtomicU64>,
}

impl PushServer {
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<u8> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn chunk_queries(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().chunk_queries.clone()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(state: ServerState) -> PushServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(state));
    let body_bytes = Arc::new(AtomicU64::new(0));
    let shared = Arc::clone(&state);
    let counter = Arc::clone(&body_bytes);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &state, &counter));
        }
    });
    PushServer {
        base_url: format!("http://127.0.0.1:{}", port),
        state,
        body_bytes,
    }
}

struct Request {
    method: String,
    path: String,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream, body_bytes: &AtomicU64) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = std::str::from_utf8(&data[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data.split_off(header_end + 4);
    body_bytes.fetch_add(body.len() as u64, Ordering::SeqCst);
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body_bytes.fetch_add(n as u64, Ordering::SeqCst);
        body.extend_from_slice(&buf[..n]);
    }

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target, String::new()),
    };
    let query = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    Some(Request {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Payload of the multipart part named `name`.
fn multipart_part(req: &Request, name: &str) -> Option<Vec<u8>> {
    let ctype = req.headers.get("content-type")?;
    let boundary = ctype.split("boundary=").nth(1)?.trim_matches('"');
    let delimiter = format!("--{}", boundary);
    let marker = format!("name=\"{}\"", name);

    let mut rest = &req.body[..];
    while let Some(start) = find(rest, delimiter.as_bytes()) {
        rest = &rest[start + delimiter.len()..];
        let headers_end = find(rest, b"\r\n\r\n")?;
        let part_headers = String::from_utf8_lossy(&rest[..headers_end]);
        let content = &rest[headers_end + 4..];
        let end = find(content, format!("\r\n{}", delimiter).as_bytes())?;
        if part_headers.contains(&marker) {
            return Some(content[..end].to_vec());
        }
        rest = content;
    }
    None
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

const ME: &str = "/service-api/push/me";
const FILES_ADD: &str = "/service-api/push/files/add";

fn handle(mut stream: TcpStream, state: &Mutex<ServerState>, body_bytes: &AtomicU64) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream, body_bytes) else {
        return;
    };

    if req.path != FILES_ADD && req.path != ME {
        respond(&mut stream, "404 Not Found", r#"{"error":{"code":1000,"message":"not found"}}"#);
        return;
    }
    if req.headers.get("authorization").map(String::as_str) != Some(TOKEN) {
        respond(
            &mut stream,
            "401 Unauthorized",
            r#"{"error":{"code":2,"message":"Invalid token."}}"#,
        );
        return;
    }
    if req.path == ME {
        respond(
            &mut stream,
            "200 OK",
            r#"{"user":{"id":1,"username":"tester","display_name":"Tester"}}"#,
        );
        return;
    }

    let mut state = state.lock().unwrap();
    match req.method.as_str() {
        "GET" => {
            state.status_queries += 1;
            let body = if state.broken {
                r#"{"status":"error"}"#.to_string()
            } else if state.received.is_empty() {
                r#"{"status":"new"}"#.to_string()
            } else {
                format!(r#"{{"status":"partial","file_id":1,"start":{}}}"#, state.received.len())
            };
            respond(&mut stream, "200 OK", &body);
        }
        "POST" => {
            state.chunk_queries.push(req.query.clone());
            if req.query.get("restart").map(String::as_str) == Some("1") {
                state.received.clear();
                state.broken = false;
            }
            let Some(chunk) = multipart_part(&req, "file") else {
                respond(
                    &mut stream,
                    "400 Bad Request",
                    r#"{"status":"error","error":{"code":3,"message":"missing file","fields":["file"]}}"#,
                );
                return;
            };
            if let Some(limit) = state.stall_after {
                if state.chunk_queries.len() > limit {
                    let body =
                        format!(r#"{{"status":"partial","start":{}}}"#, state.received.len());
                    respond(&mut stream, "200 OK", &body);
                    return;
                }
            }
            state.received.extend_from_slice(&chunk);

            let size: usize = req
                .query
                .get("size")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            if state.received.len() < size {
                let body = format!(r#"{{"status":"partial","start":{}}}"#, state.received.len());
                respond(&mut stream, "200 OK", &body);
                return;
            }

            let digest = hex::encode(Md5::digest(&state.received));
            if req.query.get("checksum") != Some(&digest) {
                respond(
                    &mut stream,
                    "200 OK",
                    r#"{"status":"error","error":{"code":1000,"message":"checksum mismatch"}}"#,
                );
                return;
            }
            let body = format!(
                r#"{{"status":"complete","start":{},"build":{{"type":"downloadable","os_linux_64":true,"file":{{"id":1,"filename":"game.zip","filesize":{}}}}}}}"#,
                size, size
            );
            respond(&mut stream, "200 OK", &body);
        }
        _ => respond(&mut stream, "405 Method Not Allowed", "{}"),
    }
}
