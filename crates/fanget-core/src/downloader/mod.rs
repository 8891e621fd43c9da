//! The download coordinator.
//!
//! One coordinator thread owns the whole session: it probes the resource
//! length, preallocates the destination, then keeps the active set topped up
//! with segment fetches running on worker threads. Workers report back over
//! a channel; the coordinator writes successful bodies at their offsets,
//! requeues failures, and terminates only when every byte of the file has
//! been written. Segment failures never abort the session; probe and
//! filesystem failures always do.

mod active;

pub use active::ActiveSet;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, ensure, Context, Result};

use crate::checksum;
use crate::config::FangetConfig;
use crate::dest;
use crate::fetch::{self, FetchError, FetchTimeouts};
use crate::probe;
use crate::progress::{self, SessionCounters, StatusLine};
use crate::rotation::{ProxyEndpoint, ProxyRing};
use crate::segmenter::{Segment, SegmentAllocator};
use crate::sink::FileSink;

/// Where the session is in its lifecycle. Tagged on log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Probing,
    Allocating,
    Running,
    Completing,
    Done,
    Aborted,
}

/// Tunables for one download session.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub segment_bytes: u64,
    pub proxies: Vec<ProxyEndpoint>,
    /// Maximum segments in flight at once.
    pub max_connections: usize,
    /// Coordinator wakeup interval when no settlement arrives.
    pub tick: Duration,
    pub progress_interval: Duration,
    pub timeouts: FetchTimeouts,
}

impl DownloadOptions {
    pub fn from_config(cfg: &FangetConfig) -> Self {
        Self {
            segment_bytes: cfg.segment_bytes,
            proxies: cfg.endpoints(),
            max_connections: cfg.connection_limit(),
            tick: cfg.tick(),
            progress_interval: cfg.progress_interval(),
            timeouts: FetchTimeouts {
                connect: Duration::from_secs(cfg.connect_timeout_secs),
                total: Duration::from_secs(cfg.fetch_timeout_secs),
            },
        }
    }
}

/// Summary of a completed session.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
    /// SHA-256 of the finished file, lowercase hex.
    pub digest: String,
    /// Fresh segments allocated (the tiling count).
    pub segments: u64,
    /// Retry allocations that were needed along the way.
    pub retries: u64,
}

/// Mutable session state, owned exclusively by the coordinator thread.
struct Session {
    allocator: SegmentAllocator,
    active: ActiveSet,
    ring: ProxyRing,
    counters: Arc<SessionCounters>,
    file_len: u64,
}

type Settlement = (Segment, Result<Vec<u8>, FetchError>);

/// Download `url` into `output` (derived from the URL when `None`), fetching
/// segments concurrently through the configured proxy pool. Returns once the
/// file is complete, finalized and checksummed.
///
/// Status lines are pushed to `status_tx` (if given) on the progress
/// interval; the send never blocks the engine.
pub fn download(
    url: &str,
    output: Option<&Path>,
    opts: &DownloadOptions,
    status_tx: Option<SyncSender<StatusLine>>,
) -> Result<DownloadReport> {
    ensure!(opts.segment_bytes > 0, "segment size must be positive");
    let started = Instant::now();

    tracing::info!(phase = ?SessionPhase::Probing, url, "probing resource length");
    let probed = probe::probe(url, opts.timeouts.connect, opts.timeouts.total)
        .with_context(|| format!("length probe failed for {url}"))?;
    if !probed.accept_ranges {
        tracing::warn!("server does not advertise byte ranges; segment fetches may be rejected");
    }
    let file_len = probed.length;

    let dest: PathBuf = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(dest::derive_filename(
            url,
            probed.content_disposition.as_deref(),
        )),
    };

    tracing::info!(
        phase = ?SessionPhase::Allocating,
        bytes = file_len,
        dest = %dest.display(),
        "preallocating destination"
    );
    let sink = FileSink::create_preallocated(&dest, file_len)
        .context("could not create destination file")?;

    let counters = Arc::new(SessionCounters::default());
    let (stop_tx, stop_rx) = mpsc::channel();
    let monitor = {
        let counters = Arc::clone(&counters);
        let interval = opts.progress_interval;
        thread::spawn(move || {
            progress::run_monitor(counters, file_len, interval, status_tx, stop_rx)
        })
    };

    let mut session = Session {
        allocator: SegmentAllocator::new(file_len, opts.segment_bytes),
        active: ActiveSet::new(),
        ring: ProxyRing::new(opts.proxies.clone()),
        counters,
        file_len,
    };

    tracing::info!(
        phase = ?SessionPhase::Running,
        segments = file_len.div_ceil(opts.segment_bytes),
        limit = opts.max_connections,
        proxies = session.ring.len(),
        "downloading"
    );
    let transfer = run_transfer_loop(url, &sink, &mut session, opts);

    let _ = stop_tx.send(());
    let _ = monitor.join();

    if let Err(err) = transfer {
        tracing::error!(phase = ?SessionPhase::Aborted, error = %err, "session aborted");
        return Err(err);
    }

    tracing::info!(phase = ?SessionPhase::Completing, "all bytes present, finalizing");
    sink.sync().context("final sync failed")?;
    sink.finalize(&dest).context("finalize failed")?;
    let digest = checksum::sha256_file(&dest).context("checksum of finished file failed")?;

    let report = DownloadReport {
        path: dest,
        bytes: file_len,
        elapsed: started.elapsed(),
        digest,
        segments: session.allocator.fresh_emitted(),
        retries: session.allocator.retries_emitted(),
    };
    tracing::info!(
        phase = ?SessionPhase::Done,
        digest = %report.digest,
        bytes = report.bytes,
        retries = report.retries,
        elapsed_secs = report.elapsed.as_secs_f64(),
        "download completed"
    );
    Ok(report)
}

/// The driving loop: top up to the connection limit, wait one tick (or one
/// settlement), account the result, check completion. Termination is defined
/// solely by the downloaded byte count reaching the file length; an empty
/// allocator with work still in flight just means "wait" (those fetches may
/// yet fail and requeue).
fn run_transfer_loop(
    url: &str,
    sink: &FileSink,
    session: &mut Session,
    opts: &DownloadOptions,
) -> Result<()> {
    let (settle_tx, settle_rx) = mpsc::channel::<Settlement>();
    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    let limit = opts.max_connections.max(1);

    loop {
        if session.counters.downloaded.load(Ordering::Relaxed) >= session.file_len {
            break;
        }

        while session.active.len() < limit {
            let Some(start) = session.allocator.next() else {
                break;
            };
            let segment = Segment::clamped(start, opts.segment_bytes, session.file_len);
            if !session.active.insert(start) {
                // A retry can only be emitted after its previous attempt
                // settled, so a duplicate here is a bookkeeping bug.
                bail!("segment {start} dispatched while already in flight");
            }
            session
                .counters
                .in_flight
                .store(session.active.len(), Ordering::Relaxed);

            let proxy = session.ring.pick().cloned();
            let route = proxy
                .as_ref()
                .map_or_else(|| "direct".to_string(), |p| p.proxy_url());
            tracing::debug!(start, len = segment.len, route = %route, "dispatching segment");

            let tx = settle_tx.clone();
            let url = url.to_string();
            let timeouts = opts.timeouts;
            workers.push(thread::spawn(move || {
                let result = fetch::fetch_segment(&url, &segment, proxy.as_ref(), timeouts);
                let _ = tx.send((segment, result));
            }));
        }

        match settle_rx.recv_timeout(opts.tick) {
            Ok((segment, Ok(body))) => {
                sink.write_at(segment.start, &body)
                    .context("destination write failed")?;
                session.active.remove(segment.start);
                session
                    .counters
                    .downloaded
                    .fetch_add(body.len() as u64, Ordering::Relaxed);
                session
                    .counters
                    .in_flight
                    .store(session.active.len(), Ordering::Relaxed);
                tracing::debug!(start = segment.start, len = segment.len, "segment ok");
            }
            Ok((segment, Err(err))) => {
                session.active.remove(segment.start);
                session
                    .counters
                    .in_flight
                    .store(session.active.len(), Ordering::Relaxed);
                session.allocator.push_retry(segment.start);
                tracing::warn!(start = segment.start, error = %err, "segment failed, queued for retry");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => bail!("settlement channel closed"),
        }
    }

    // Every tiling segment succeeded exactly once, so nothing is in flight.
    debug_assert!(session.active.is_empty());
    drop(settle_tx);
    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}
