//! Hub configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How device commands are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    /// Forward to a theater-bridge over TCP
    Bridge,
    /// Log commands only (for development)
    #[default]
    DryRun,
}

/// Gateway configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    /// Bridge address (when mode is Bridge)
    pub bridge_address: String,
    pub connect_timeout_ms: u64,
    /// Upper bound on one command delivery, connect included
    pub command_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::DryRun,
            bridge_address: "127.0.0.1:9000".into(),
            connect_timeout_ms: 2_000,
            command_timeout_ms: 10_000,
        }
    }
}

/// Configuration for the hub
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name of this hub instance, used in logs
    pub hub_id: String,
    pub gateway: GatewayConfig,
    /// Address monitors connect to for progress events
    pub progress_listen: String,
    /// Events buffered per monitor before it starts skipping
    pub progress_buffer: usize,
    /// Devices and activities to load at startup
    pub seed_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_id: "hub-001".into(),
            gateway: GatewayConfig::default(),
            progress_listen: "127.0.0.1:8081".into(),
            progress_buffer: 256,
            seed_path: None,
        }
    }
}

impl HubConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))
    }
}
