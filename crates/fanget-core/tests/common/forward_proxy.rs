//! Minimal HTTP/1.1 forward proxy for integration tests.
//!
//! Accepts absolute-form requests (`GET http://host:port/path HTTP/1.1`),
//! rewrites the request line to origin form, relays it to the target, and
//! streams the response back until the origin closes. Counts the requests
//! it forwards so tests can assert rotation actually spread the load.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Starts a proxy in a background thread. Returns its port and the shared
/// forwarded-request counter. Runs until the process exits.
pub fn start() -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind proxy");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let requests = Arc::clone(&requests);
            thread::spawn(move || handle(stream, &requests));
        }
    });
    (port, counter)
}

fn handle(mut client: TcpStream, requests: &AtomicUsize) {
    let _ = client.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = client.set_write_timeout(Some(std::time::Duration::from_secs(2)));

    let peer = match client.try_clone() {
        Ok(p) => p,
        Err(_) => return,
    };
    let mut reader = BufReader::new(peer);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();

    // Headers up to the blank line. GET/HEAD carry no body.
    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                headers.push(line.to_string());
            }
        }
    }

    let Ok(url) = url::Url::parse(&target) else {
        let _ = client.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
        return;
    };
    let host = match url.host_str() {
        Some(h) => h.to_string(),
        None => {
            let _ = client.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
            return;
        }
    };
    let port = url.port_or_known_default().unwrap_or(80);
    let mut path = url.path().to_string();
    if let Some(q) = url.query() {
        path.push('?');
        path.push_str(q);
    }

    requests.fetch_add(1, Ordering::SeqCst);

    let Ok(mut upstream) = TcpStream::connect((host.as_str(), port)) else {
        let _ = client.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n");
        return;
    };

    let mut head = format!("{} {} HTTP/1.1\r\n", method, path);
    for h in &headers {
        if h.to_ascii_lowercase().starts_with("proxy-connection") {
            continue;
        }
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    if upstream.write_all(head.as_bytes()).is_err() {
        return;
    }

    // Relay the response until the origin closes the connection.
    let mut buf = [0u8; 8192];
    loop {
        match upstream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if client.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        }
    }
}
