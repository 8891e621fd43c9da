//! Single-attempt segment fetch: one range GET, optionally via a proxy.
//!
//! Exactly one HTTP attempt per call; success or a classified failure is the
//! whole contract. Retry policy lives with the coordinator's retry queue.

use std::time::Duration;

use thiserror::Error;

use crate::rotation::ProxyEndpoint;
use crate::segmenter::Segment;

/// Why a single fetch attempt failed. Every variant is recoverable: the
/// coordinator requeues the segment and the session carries on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure, including connect/read timeouts.
    #[error("network: {0}")]
    Network(#[from] curl::Error),
    /// Transfer completed but the server answered outside 2xx.
    #[error("HTTP {0}")]
    Protocol(u32),
    /// Transfer reported success but the body length is wrong. Also raised
    /// when a range-ignoring server answers 200 with the full resource.
    #[error("unexpected length: wanted {expected} bytes, got {received}")]
    UnexpectedLength { expected: u64, received: u64 },
}

/// Timeouts applied to every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub connect: Duration,
    pub total: Duration,
}

/// Fetch one segment's bytes with a single range GET.
///
/// The segment is expected to be pre-clamped to the file length, so the body
/// must be exactly `segment.len` bytes; anything else is `UnexpectedLength`.
/// When `proxy` is set the request is routed through it.
pub fn fetch_segment(
    url: &str,
    segment: &Segment,
    proxy: Option<&ProxyEndpoint>,
    timeouts: FetchTimeouts,
) -> Result<Vec<u8>, FetchError> {
    let mut body: Vec<u8> = Vec::with_capacity(segment.len as usize);

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(timeouts.connect)?;
    easy.timeout(timeouts.total)?;
    easy.range(&segment.range_value())?;
    if let Some(endpoint) = proxy {
        easy.proxy(&endpoint.proxy_url())?;
    }

    let mut headers = curl::easy::List::new();
    headers.append("Connection: keep-alive")?;
    easy.http_headers(headers)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Protocol(code));
    }

    let received = body.len() as u64;
    if received != segment.len {
        return Err(FetchError::UnexpectedLength {
            expected: segment.len,
            received,
        });
    }

    Ok(body)
}
