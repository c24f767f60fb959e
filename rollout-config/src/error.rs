//! Error types for rollout-config.

use thiserror::Error;

/// All errors that can arise from parsing or validating a config document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document was empty or whitespace only.
    #[error("{file} is empty")]
    Empty { file: String },

    /// YAML syntax or shape error: includes line context from serde_yaml.
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("at least one api must be declared")]
    NoApis,

    #[error("api '{0}' is declared more than once")]
    DuplicateApi(String),

    #[error("apis '{first}' and '{second}' share endpoint '{endpoint}'")]
    DuplicateEndpoint {
        endpoint: String,
        first: String,
        second: String,
    },

    #[error("api '{api}': endpoint '{endpoint}' must start with '/'")]
    InvalidEndpoint { api: String, endpoint: String },

    #[error("api '{api}': one of `model` or `request_handler` is required")]
    MissingModel { api: String },

    #[error("api '{api}': `request_handler` requires a project archive")]
    ProjectRequired { api: String },

    #[error("api '{api}': invalid compute: {reason}")]
    InvalidCompute { api: String, reason: String },
}
