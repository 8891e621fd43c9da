//! Throughput sampling and status lines.
//!
//! A monitor thread samples the session counters on a fixed period and
//! emits one status line per sample. Observational only: it reads the
//! counters, never touches engine state, and drops lines rather than block.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

/// Counters shared between the coordinator (sole writer) and the monitor.
#[derive(Debug, Default)]
pub struct SessionCounters {
    /// Bytes written to the sink so far. Monotonically non-decreasing.
    pub downloaded: AtomicU64,
    /// Segments currently in flight.
    pub in_flight: AtomicUsize,
}

/// One progress sample, ready to print.
#[derive(Debug, Clone)]
pub struct StatusLine {
    /// Bytes per second over the last sample period.
    pub rate: u64,
    pub downloaded: u64,
    pub total: u64,
    pub in_flight: usize,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "speed: {}\t, downloaded: {}, total: {}, active: {}",
            human_rate(self.rate),
            self.downloaded,
            self.total,
            self.in_flight
        )
    }
}

/// Format a byte rate the way the status line shows it: whole bytes, whole
/// KB, or MB with one (floored) decimal.
pub fn human_rate(bytes_per_sec: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes_per_sec >= MB {
        let tenths = (bytes_per_sec as f64 / MB as f64 * 10.0).floor() / 10.0;
        format!("{:.1}MB", tenths)
    } else if bytes_per_sec >= KB {
        format!("{}KB", bytes_per_sec / KB)
    } else {
        format!("{}B", bytes_per_sec)
    }
}

/// Monitor loop: sample every `interval` until the stop channel fires (or
/// disconnects). Status lines go to `status_tx` with `try_send`, so a slow
/// or absent consumer never stalls sampling.
pub(crate) fn run_monitor(
    counters: Arc<SessionCounters>,
    total: u64,
    interval: Duration,
    status_tx: Option<SyncSender<StatusLine>>,
    stop_rx: Receiver<()>,
) {
    let mut previous_sample = 0u64;
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let downloaded = counters.downloaded.load(Ordering::Relaxed);
        let delta = downloaded.saturating_sub(previous_sample);
        let rate = (delta as f64 / interval.as_secs_f64()) as u64;
        let line = StatusLine {
            rate,
            downloaded,
            total,
            in_flight: counters.in_flight.load(Ordering::Relaxed),
        };
        tracing::info!(
            rate = %human_rate(line.rate),
            downloaded = line.downloaded,
            total = line.total,
            active = line.in_flight,
            "progress"
        );
        if let Some(tx) = &status_tx {
            let _ = tx.try_send(line);
        }
        previous_sample = downloaded;
    }
}
