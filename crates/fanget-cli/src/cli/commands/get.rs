//! `fanget get` – run one download session.

use anyhow::Result;
use fanget_core::config::FangetConfig;
use fanget_core::downloader::{self, DownloadOptions};
use fanget_core::progress::StatusLine;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

pub fn run_get(
    cfg: &FangetConfig,
    url: &str,
    output: Option<PathBuf>,
    connections: Option<usize>,
) -> Result<()> {
    let mut opts = DownloadOptions::from_config(cfg);
    if let Some(n) = connections {
        opts.max_connections = n.max(1);
    }

    let (status_tx, status_rx) = mpsc::sync_channel::<StatusLine>(16);
    let printer = thread::spawn(move || {
        while let Ok(line) = status_rx.recv() {
            println!("{line}");
        }
    });

    let result = downloader::download(url, output.as_deref(), &opts, Some(status_tx));
    // The engine's monitor dropped its sender; the printer drains and exits.
    let _ = printer.join();

    let report = result?;
    println!(
        "done: {} ({} bytes in {:.1}s, {} segments, {} retries)",
        report.path.display(),
        report.bytes,
        report.elapsed.as_secs_f64(),
        report.segments,
        report.retries
    );
    println!("sha256: {}", report.digest);
    Ok(())
}
