//! `rollout.yaml` document shape and validation rules.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use rollout_core::types::check_name;
use rollout_core::Compute;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Parsed `rollout.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub apis: Vec<ApiConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_handler: Option<String>,
    #[serde(default)]
    pub compute: ComputeConfig,
}

/// Compute request as written; unset fields take [`Compute::default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpu_utilization: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<u32>,
}

/// A resource quantity written either as a string (`"500m"`) or a bare number (`1`, `0.5`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Text(String),
    Integer(u64),
    Decimal(DecimalText),
}

/// Decimal YAML number kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct DecimalText(String);

impl From<f64> for DecimalText {
    fn from(value: f64) -> Self {
        Self(value.to_string())
    }
}

impl From<DecimalText> for f64 {
    fn from(value: DecimalText) -> Self {
        value.0.parse().unwrap_or_default()
    }
}

impl Quantity {
    pub fn as_text(&self) -> String {
        match self {
            Quantity::Text(s) => s.trim().to_string(),
            Quantity::Integer(n) => n.to_string(),
            Quantity::Decimal(d) => d.0.clone(),
        }
    }
}

impl ComputeConfig {
    /// Fill unset fields from defaults. `init_replicas` defaults to `min_replicas`.
    pub fn resolve(&self) -> Compute {
        let defaults = Compute::default();
        let min_replicas = self.min_replicas.unwrap_or(defaults.min_replicas);
        Compute {
            min_replicas,
            max_replicas: self.max_replicas.unwrap_or(defaults.max_replicas),
            init_replicas: self.init_replicas.unwrap_or(min_replicas),
            target_cpu_utilization: self
                .target_cpu_utilization
                .unwrap_or(defaults.target_cpu_utilization),
            cpu: self.cpu.as_ref().map(Quantity::as_text).unwrap_or(defaults.cpu),
            mem: self.mem.as_ref().map(Quantity::as_text),
            gpu: self.gpu.unwrap_or(defaults.gpu),
        }
    }
}

impl ApiConfig {
    /// Declared endpoint, or `/<app>/<api>`.
    pub fn resolved_endpoint(&self, app_name: &str) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("/{}/{}", app_name, self.name))
    }
}

// ---------------------------------------------------------------------------
// Parse + validate
// ---------------------------------------------------------------------------

impl UserConfig {
    /// Parse a config document. `file` names the document in error messages.
    pub fn parse(file: &str, bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ConfigError::Empty {
                file: file.to_string(),
            });
        }
        serde_yaml::from_slice(bytes).map_err(|source| ConfigError::Parse {
            file: file.to_string(),
            source,
        })
    }

    /// Check every rule that parsing alone cannot express.
    ///
    /// `project` is the optional project archive submitted alongside the document.
    pub fn validate(&self, project: Option<&[u8]>) -> Result<(), ConfigError> {
        validate_name("app", &self.app.name)?;
        if self.apis.is_empty() {
            return Err(ConfigError::NoApis);
        }

        let mut seen_names: HashSet<&str> = HashSet::new();
        let mut seen_endpoints: HashMap<String, &str> = HashMap::new();
        for api in &self.apis {
            validate_name("api", &api.name)?;
            if !seen_names.insert(api.name.as_str()) {
                return Err(ConfigError::DuplicateApi(api.name.clone()));
            }

            let endpoint = api.resolved_endpoint(&self.app.name);
            if !endpoint.starts_with('/') {
                return Err(ConfigError::InvalidEndpoint {
                    api: api.name.clone(),
                    endpoint,
                });
            }
            if let Some(first) = seen_endpoints.insert(endpoint.clone(), api.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint {
                    endpoint,
                    first: first.to_string(),
                    second: api.name.clone(),
                });
            }

            if api.model.is_none() && api.request_handler.is_none() {
                return Err(ConfigError::MissingModel {
                    api: api.name.clone(),
                });
            }
            if api.request_handler.is_some() && project.map_or(true, <[u8]>::is_empty) {
                return Err(ConfigError::ProjectRequired {
                    api: api.name.clone(),
                });
            }

            validate_compute(&api.name, &api.compute.resolve())?;
        }
        Ok(())
    }
}

fn validate_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    check_name(name).map_err(|reason| ConfigError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    })
}

fn validate_compute(api: &str, compute: &Compute) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidCompute {
        api: api.to_string(),
        reason,
    };
    if compute.min_replicas < 1 {
        return Err(invalid("min_replicas must be at least 1".to_string()));
    }
    if compute.min_replicas > compute.max_replicas {
        return Err(invalid(format!(
            "min_replicas ({}) exceeds max_replicas ({})",
            compute.min_replicas, compute.max_replicas
        )));
    }
    if compute.init_replicas < compute.min_replicas || compute.init_replicas > compute.max_replicas
    {
        return Err(invalid(format!(
            "init_replicas ({}) must be between min_replicas ({}) and max_replicas ({})",
            compute.init_replicas, compute.min_replicas, compute.max_replicas
        )));
    }
    if !(1..=100).contains(&compute.target_cpu_utilization) {
        return Err(invalid(format!(
            "target_cpu_utilization ({}) must be between 1 and 100",
            compute.target_cpu_utilization
        )));
    }
    if !is_positive_cpu_quantity(&compute.cpu) {
        return Err(invalid(format!("cpu '{}' is not a positive quantity", compute.cpu)));
    }
    Ok(())
}

/// `"2"`, `"0.5"`, `"250m"`.
fn is_positive_cpu_quantity(cpu: &str) -> bool {
    match cpu.strip_suffix('m') {
        Some(millis) => millis.parse::<u64>().map_or(false, |m| m > 0),
        None => cpu
            .parse::<f64>()
            .map_or(false, |cores| cores.is_finite() && cores > 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_compute_uses_defaults() {
        let compute = ComputeConfig::default().resolve();
        assert_eq!(compute, Compute::default());
    }

    #[test]
    fn init_replicas_follows_min_replicas() {
        let config = ComputeConfig {
            min_replicas: Some(3),
            max_replicas: Some(5),
            ..ComputeConfig::default()
        };
        assert_eq!(config.resolve().init_replicas, 3);
    }

    #[test]
    fn numeric_quantities_are_kept_as_text() {
        let config: ComputeConfig = serde_yaml::from_str("cpu: 1\nmem: 2Gi\n").expect("parse");
        let compute = config.resolve();
        assert_eq!(compute.cpu, "1");
        assert_eq!(compute.mem.as_deref(), Some("2Gi"));

        let decimal: ComputeConfig = serde_yaml::from_str("cpu: 0.5\n").expect("parse");
        assert_eq!(decimal.resolve().cpu, "0.5");
    }

    #[test]
    fn cpu_quantity_forms() {
        assert!(is_positive_cpu_quantity("1"));
        assert!(is_positive_cpu_quantity("0.25"));
        assert!(is_positive_cpu_quantity("250m"));
        assert!(!is_positive_cpu_quantity("0"));
        assert!(!is_positive_cpu_quantity("0m"));
        assert!(!is_positive_cpu_quantity("lots"));
    }

    #[test]
    fn default_endpoint_is_app_scoped() {
        let api = ApiConfig {
            name: "classifier".to_string(),
            endpoint: None,
            model: Some("s3://m".to_string()),
            request_handler: None,
            compute: ComputeConfig::default(),
        };
        assert_eq!(api.resolved_endpoint("iris"), "/iris/classifier");
    }
}
