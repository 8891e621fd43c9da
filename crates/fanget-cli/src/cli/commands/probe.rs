//! `fanget probe` – inspect a resource without downloading it.

use anyhow::Result;
use fanget_core::config::FangetConfig;
use fanget_core::{dest, probe};
use std::time::Duration;

pub fn run_probe(cfg: &FangetConfig, url: &str) -> Result<()> {
    let probed = probe::probe(
        url,
        Duration::from_secs(cfg.connect_timeout_secs),
        Duration::from_secs(cfg.fetch_timeout_secs),
    )?;
    println!("length: {} bytes", probed.length);
    println!(
        "ranges: {}",
        if probed.accept_ranges {
            "bytes"
        } else {
            "not advertised"
        }
    );
    println!(
        "filename: {}",
        dest::derive_filename(url, probed.content_disposition.as_deref())
    );
    Ok(())
}
