//! Minimal HTTP/1.1 server with HEAD and Range GET support for integration
//! tests, plus deterministic fault injection.
//!
//! Serves a single static body. HEAD answers with Content-Length and
//! Accept-Ranges: bytes; GET with a Range header answers 206 Partial
//! Content. Faults are keyed off a global GET counter so tests are
//! reproducible: every Nth GET can fail with HTTP 500 or serve a short body.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

/// How many bytes a "short body" response is truncated by.
const SHORT_BY: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct FaultOptions {
    /// Every Nth GET returns HTTP 500 with no body.
    pub fail_every: Option<u32>,
    /// Every Nth GET serves the requested range truncated by a few bytes,
    /// with a matching Content-Length (transport succeeds, length is wrong).
    pub short_every: Option<u32>,
    /// HEAD returns 405, so the length probe fails.
    pub block_head: bool,
}

/// Starts a fault-free server in a background thread serving `body`.
/// Returns the base URL. The server runs until the process exits.
pub fn start(body: Vec<u8>) -> String {
    start_with_faults(body, FaultOptions::default())
}

/// Like `start` but with fault injection.
pub fn start_with_faults(body: Vec<u8>, faults: FaultOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicU32::new(0));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let gets = Arc::clone(&gets);
            thread::spawn(move || handle(stream, &body, faults, &gets));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], faults: FaultOptions, gets: &AtomicU32) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        if faults.block_head {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n\r\n",
            total
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        let seq = gets.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(faults.fail_every, Some(every) if seq % every == 0) {
            let _ = stream.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
            return;
        }

        let (status, range_header, mut slice) = match range {
            Some((start, end_incl)) => {
                let start = start.min(total);
                let end_incl = end_incl.min(total.saturating_sub(1));
                if start > end_incl {
                    (
                        "416 Range Not Satisfiable",
                        format!("bytes */{}", total),
                        &body[0..0],
                    )
                } else {
                    let start = start as usize;
                    let end_excl = (end_incl + 1).min(total) as usize;
                    (
                        "206 Partial Content",
                        format!("bytes {}-{}/{}", start, end_excl - 1, total),
                        &body[start..end_excl],
                    )
                }
            }
            None => (
                "200 OK",
                format!("bytes 0-{}/{}", total.saturating_sub(1), total),
                body,
            ),
        };

        if matches!(faults.short_every, Some(every) if seq % every == 0) && slice.len() > SHORT_BY {
            slice = &slice[..slice.len() - SHORT_BY];
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Range: {}\r\nAccept-Ranges: bytes\r\n\r\n",
            status,
            slice.len(),
            range_header
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(slice);
        return;
    }

    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
}

/// Returns (method, optional (start, end_inclusive) from `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(part) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = part.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
