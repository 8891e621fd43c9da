//! Length probe: one HEAD request before anything is allocated.
//!
//! The probe goes directly to the origin (never through the proxy pool) and
//! must yield a usable `Content-Length`; without one the session aborts
//! before any file is created. Also captures whether the server advertises
//! byte ranges and a `Content-Disposition` filename hint.

mod parse;

use std::str;
use std::time::Duration;

use thiserror::Error;

/// Probe failure. Always fatal for the session.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),
    #[error("HEAD returned HTTP {0}")]
    Http(u32),
    #[error("no usable Content-Length in response")]
    LengthUnavailable,
}

/// What the probe learned about the resource.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Total resource size in bytes.
    pub length: u64,
    /// True when the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `Content-Disposition` value, if present (filename hint).
    pub content_disposition: Option<String>,
}

/// HEAD the resource and parse the headers the engine needs.
/// Follows redirects; runs on the calling thread.
pub fn probe(
    url: &str,
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<ProbeResult, ProbeError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(timeout)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(ProbeError::Http(code));
    }

    parse::probe_result(&lines)
}
