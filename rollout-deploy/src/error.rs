//! Error types for rollout-deploy.

use thiserror::Error;

use rollout_config::ConfigError;
use rollout_core::{AppName, StoreError};

/// Failure reported by a collaborator behind one of the [`ports`](crate::ports).
#[derive(Debug, Error)]
pub enum PortError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unavailable(String),

    /// The collaborator refuses the context as submitted.
    #[error("{0}")]
    Invalid(String),
}

/// All errors that abort a deploy attempt.
///
/// Admission rejections are not errors; see [`crate::Admission`].
#[derive(Debug, Error)]
pub enum DeployError {
    /// A required part of the submission was absent or empty.
    #[error("{name} must be provided")]
    MissingRequiredInput { name: &'static str },

    /// The config document failed to parse or validate.
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The orchestrator refused the context before admission.
    #[error("deployment of '{app}' is not valid: {source}")]
    InvalidDeploy {
        app: AppName,
        #[source]
        source: PortError,
    },

    /// Reading deployment status, the previous context, or the base URL failed.
    #[error("failed to read {what} for '{app}': {source}")]
    Lookup {
        app: AppName,
        what: &'static str,
        #[source]
        source: PortError,
    },

    /// The durable upload failed; orchestration was not triggered.
    #[error("failed to upload context for '{app}': {source}")]
    Persistence {
        app: AppName,
        #[source]
        source: PortError,
    },

    /// Starting the run failed; the uploaded context may already be durable.
    #[error("failed to start deployment of '{app}': {source}")]
    Orchestration {
        app: AppName,
        #[source]
        source: PortError,
    },
}

/// Coarse error taxonomy of a failed deploy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Lookup,
    Persistence,
    Orchestration,
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::MissingRequiredInput { .. }
            | DeployError::InvalidConfig(_)
            | DeployError::InvalidDeploy { .. } => ErrorKind::Input,
            DeployError::Lookup { .. } => ErrorKind::Lookup,
            DeployError::Persistence { .. } => ErrorKind::Persistence,
            DeployError::Orchestration { .. } => ErrorKind::Orchestration,
        }
    }
}
