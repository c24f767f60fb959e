//! Daemon settings from `~/.rollout/daemon.yaml`.
//!
//! ```yaml
//! apis_base_url: http://localhost:8888
//! settle_ms: 2000
//! node_cpu: "4"      # optional, per-replica cpu ceiling
//! node_gpu: 1        # optional, per-replica gpu ceiling
//! ```
//!
//! A missing file means defaults. `ROLLOUT_APIS_BASE_URL` overrides the base URL.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rollout_config::schema::Quantity;
use rollout_core::types::cpu_millis;
use rollout_deploy::NodeCapacity;

use crate::error::{io_err, DaemonError};
use crate::paths::config_path;

pub const APIS_BASE_URL_ENV: &str = "ROLLOUT_APIS_BASE_URL";

const DEFAULT_APIS_BASE_URL: &str = "http://localhost:8888";
const DEFAULT_SETTLE_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Base URL reported back to clients after a deploy starts.
    pub apis_base_url: String,
    /// How long a run stays `updating` before the daemon marks it idle.
    pub settle_ms: u64,
    /// CPU of the largest node; deploys requesting more per replica are refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_cpu: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_gpu: Option<u32>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            apis_base_url: DEFAULT_APIS_BASE_URL.to_string(),
            settle_ms: DEFAULT_SETTLE_MS,
            node_cpu: None,
            node_gpu: None,
        }
    }
}

impl DaemonConfig {
    /// Read `<home>/.rollout/daemon.yaml` and apply the environment override.
    pub fn load_at(home: &Path) -> Result<Self, DaemonError> {
        let config = Self::read_file_at(home)?;
        Ok(config.with_base_url_override(std::env::var(APIS_BASE_URL_ENV).ok()))
    }

    /// Read the settings file only. Missing or blank files yield defaults.
    pub fn read_file_at(home: &Path) -> Result<Self, DaemonError> {
        let path = config_path(home);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(io_err(&path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|source| DaemonError::Config { path: path.clone(), source })?;
        if let Some(cpu) = config.node_cpu.as_ref().map(Quantity::as_text) {
            if cpu_millis(&cpu).is_none() {
                return Err(DaemonError::InvalidSetting {
                    path,
                    field: "node_cpu",
                    value: cpu,
                });
            }
        }
        Ok(config)
    }

    pub fn with_base_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.apis_base_url = url.trim().to_string();
        }
        self
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn capacity(&self) -> NodeCapacity {
        NodeCapacity {
            cpu_millis: self
                .node_cpu
                .as_ref()
                .and_then(|cpu| cpu_millis(&cpu.as_text())),
            gpu: self.node_gpu,
        }
    }
}
