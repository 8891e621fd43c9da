//! Global configuration loaded from `~/.config/fanget/config.toml`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::rotation::ProxyEndpoint;

/// In-flight segment limit when no proxies are configured (direct mode).
const DIRECT_CONNECTIONS: usize = 4;

/// Engine configuration. The target URL and output path are CLI arguments;
/// everything else lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FangetConfig {
    /// Segment size in bytes.
    pub segment_bytes: u64,
    /// Outbound proxy hosts, all listening on `proxy_port`. Empty = fetch
    /// directly from the origin.
    #[serde(default)]
    pub proxy_hosts: Vec<String>,
    /// Port every proxy host listens on.
    pub proxy_port: u16,
    /// In-flight segments allowed per proxy host.
    pub connections_per_proxy: usize,
    /// Hard override for the in-flight segment limit. When unset the limit
    /// is `proxy_hosts.len() * connections_per_proxy` (or a small direct-mode
    /// default with no proxies).
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// Coordinator wakeup interval in milliseconds.
    pub tick_ms: u64,
    /// Seconds between progress samples.
    pub progress_interval_secs: u64,
    /// Connect timeout per HTTP attempt, seconds.
    pub connect_timeout_secs: u64,
    /// Total timeout per HTTP attempt, seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for FangetConfig {
    fn default() -> Self {
        Self {
            segment_bytes: 512 * 1024,
            proxy_hosts: Vec::new(),
            proxy_port: 9704,
            connections_per_proxy: 5,
            max_connections: None,
            tick_ms: 100,
            progress_interval_secs: 5,
            connect_timeout_secs: 15,
            fetch_timeout_secs: 300,
        }
    }
}

impl FangetConfig {
    /// Proxy host list as typed endpoints.
    pub fn endpoints(&self) -> Vec<ProxyEndpoint> {
        self.proxy_hosts
            .iter()
            .map(|h| ProxyEndpoint::new(h.clone(), self.proxy_port))
            .collect()
    }

    /// Effective in-flight segment limit.
    pub fn connection_limit(&self) -> usize {
        if let Some(n) = self.max_connections {
            return n.max(1);
        }
        if self.proxy_hosts.is_empty() {
            DIRECT_CONNECTIONS
        } else {
            (self.proxy_hosts.len() * self.connections_per_proxy).max(1)
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fanget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, writing a default file on first run.
pub fn load_or_init() -> Result<FangetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FangetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FangetConfig = toml::from_str(&data)?;
    Ok(cfg)
}
