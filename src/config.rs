use crate::cache::DEFAULT_CACHE_TTL_SECS;
use crate::ports::{self, DEFAULT_PORT_RANGE_END, DEFAULT_PORT_RANGE_START};
use crate::scanner::ScanOptions;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Caller-supplied scan settings. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub port_range_start: u16,
    pub port_range_end: u16,
    /// TCP connect timeout, sweeps and related-port follow-up.
    pub tcp_timeout_ms: u64,
    /// UDP reply timeout for discovery.
    pub discovery_timeout_ms: u64,
    pub tcp_batch_size: usize,
    pub discovery_batch_size: usize,
    pub cache_ttl_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            port_range_start: DEFAULT_PORT_RANGE_START,
            port_range_end: DEFAULT_PORT_RANGE_END,
            tcp_timeout_ms: 500,
            discovery_timeout_ms: 1000,
            tcp_batch_size: 20,
            discovery_batch_size: 30,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl ScanConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("invalid scan config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file: {}", path.as_ref().display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("failed to load config: {}", path.as_ref().display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.port_range_start == 0 {
            bail!("port_range_start must be at least 1");
        }
        if self.port_range_start > self.port_range_end {
            bail!(
                "invalid port range {}-{} (start > end)",
                self.port_range_start,
                self.port_range_end
            );
        }
        if self.tcp_batch_size == 0 || self.discovery_batch_size == 0 {
            bail!("batch sizes must be at least 1");
        }
        Ok(())
    }

    pub fn ports(&self) -> Vec<u16> {
        ports::port_range(self.port_range_start, self.port_range_end)
    }

    pub fn tcp_options(&self) -> ScanOptions {
        let timeout = Duration::from_millis(self.tcp_timeout_ms);
        ScanOptions {
            ports: self.ports(),
            timeout,
            related_timeout: timeout,
            batch_size: self.tcp_batch_size,
        }
    }

    pub fn discovery_options(&self) -> ScanOptions {
        ScanOptions {
            ports: self.ports(),
            timeout: Duration::from_millis(self.discovery_timeout_ms),
            related_timeout: Duration::from_millis(self.tcp_timeout_ms),
            batch_size: self.discovery_batch_size,
        }
    }
}
