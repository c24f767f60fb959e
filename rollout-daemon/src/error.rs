use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, its settings, and the socket protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {field} '{value}' in {path}")]
    InvalidSetting {
        path: PathBuf,
        field: &'static str,
        value: String,
    },

    #[error("store error: {0}")]
    Store(#[from] rollout_core::StoreError),

    #[error("orchestrator error: {0}")]
    Port(#[from] rollout_deploy::PortError),

    #[error(transparent)]
    Deploy(#[from] rollout_deploy::DeployError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project archive is not valid hex: {0}")]
    InvalidProject(#[from] hex::FromHexError),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
