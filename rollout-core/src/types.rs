//! Domain types for the Rollout context model.
//!
//! A [`Context`] is an immutable snapshot of one application's desired
//! deployment. Its `id`, and the `id` of every [`Api`] and [`Compute`] inside
//! it, are pure functions of declared content (see [`crate::identity`]).
//! All types are serializable via serde + serde_json.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::ContentHasher;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Logical application identifier; the unit of admission control.
    AppName
);
string_newtype!(
    /// Name of an API, unique within its [`Context`].
    ApiName
);
string_newtype!(
    /// Content-derived identity of a whole [`Context`].
    ContextId
);
string_newtype!(
    /// Content-derived identity of an API definition (code/model references, config).
    ApiId
);
string_newtype!(
    /// Content-derived identity of a [`Compute`] descriptor.
    ComputeId
);

/// Longest accepted application or API name.
pub const MAX_NAME_LEN: usize = 63;

/// Check a resource name: 1 to 63 lowercase letters, digits and `-`, starting
/// with a letter and not ending with `-`. Returns the violated rule.
///
/// Application names become directory names in the store, so this is also
/// what keeps them a single path component.
pub fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err("must be 1 to 63 characters");
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("must start with a lowercase letter");
    }
    if name.ends_with('-') {
        return Err("must not end with '-'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("may only contain lowercase letters, digits and '-'");
    }
    Ok(())
}

impl AppName {
    pub fn check(&self) -> Result<(), &'static str> {
        check_name(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether an application's deployment is currently being applied.
///
/// Owned and mutated by the deploy orchestrator; the deploy core only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Idle,
    Updating,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Idle => write!(f, "idle"),
            DeploymentStatus::Updating => write!(f, "updating"),
        }
    }
}

// ---------------------------------------------------------------------------
// Compute
// ---------------------------------------------------------------------------

/// Resource request for one API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compute {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub init_replicas: u32,
    /// Autoscaling target, percent of requested CPU.
    pub target_cpu_utilization: u32,
    /// CPU quantity, e.g. `"1"`, `"0.5"`, `"200m"`.
    pub cpu: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<String>,
    #[serde(default)]
    pub gpu: u32,
}

impl Default for Compute {
    fn default() -> Self {
        Self {
            min_replicas: 1,
            max_replicas: 100,
            init_replicas: 1,
            target_cpu_utilization: 80,
            cpu: "200m".to_string(),
            mem: None,
            gpu: 0,
        }
    }
}

/// Millicores in a CPU quantity (`"2"`, `"0.5"`, `"250m"`); `None` if unparseable.
pub fn cpu_millis(quantity: &str) -> Option<u64> {
    match quantity.trim().strip_suffix('m') {
        Some(millis) => millis.parse().ok(),
        None => quantity
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|cores| cores.is_finite() && *cores >= 0.0)
            .map(|cores| (cores * 1000.0).round() as u64),
    }
}

impl Compute {
    /// Requested CPU per replica in millicores.
    pub fn cpu_millis(&self) -> Option<u64> {
        cpu_millis(&self.cpu)
    }

    /// Identity of this resource request; changes whenever any field changes.
    pub fn id(&self) -> ComputeId {
        let mut h = ContentHasher::new("compute");
        h.number(self.min_replicas)
            .number(self.max_replicas)
            .number(self.init_replicas)
            .number(self.target_cpu_utilization)
            .field(&self.cpu)
            .optional(self.mem.as_deref())
            .number(self.gpu);
        ComputeId(h.finish())
    }
}

// ---------------------------------------------------------------------------
// Api
// ---------------------------------------------------------------------------

/// One named workload within a [`Context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    pub name: ApiName,
    pub id: ApiId,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Path of the request handler inside the project archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_handler: Option<String>,
    pub compute: Compute,
}

/// Declared fields of an API, before its identity is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSpec {
    pub name: ApiName,
    pub endpoint: String,
    pub model: Option<String>,
    pub request_handler: Option<String>,
    pub compute: Compute,
}

impl Api {
    /// Build an API from its declared fields, deriving its `id`.
    ///
    /// `project_id` is folded into the identity only when the API references
    /// code through a request handler.
    pub fn from_spec(spec: ApiSpec, project_id: Option<&str>) -> Self {
        let mut h = ContentHasher::new("api");
        h.field(spec.name.as_str())
            .field(&spec.endpoint)
            .optional(spec.model.as_deref())
            .optional(spec.request_handler.as_deref());
        if spec.request_handler.is_some() {
            h.optional(project_id);
        }
        Self {
            id: ApiId(h.finish()),
            name: spec.name,
            endpoint: spec.endpoint,
            model: spec.model,
            request_handler: spec.request_handler,
            compute: spec.compute,
        }
    }

    /// Two APIs are equal for diffing iff both definition and compute identities match.
    pub fn matches(&self, other: &Api) -> bool {
        self.id == other.id && self.compute.id() == other.compute.id()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Application identity inside a [`Context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: AppName,
}

/// Immutable snapshot of one application's desired deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: ContextId,
    pub app: App,
    /// Durable storage key for this snapshot.
    pub key: String,
    /// SHA-256 of the project archive, when one was submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub apis: BTreeMap<ApiName, Api>,
}

impl Context {
    /// Assemble a context and derive its `id` and storage `key`.
    ///
    /// API names are keys of the map; a later API with a duplicate name
    /// replaces the earlier one, so callers validate uniqueness first.
    pub fn new(app: AppName, project_id: Option<String>, apis: impl IntoIterator<Item = Api>) -> Self {
        let apis: BTreeMap<ApiName, Api> = apis
            .into_iter()
            .map(|api| (api.name.clone(), api))
            .collect();
        let id = Self::derive_id(&app, &apis);
        let key = Self::storage_key(&app, &id);
        Self {
            id,
            app: App { name: app },
            key,
            project_id,
            apis,
        }
    }

    /// `apps/<app>/contexts/<context_id>.json`
    pub fn storage_key(app: &AppName, id: &ContextId) -> String {
        format!("apps/{}/contexts/{}.json", app, id)
    }

    fn derive_id(app: &AppName, apis: &BTreeMap<ApiName, Api>) -> ContextId {
        let mut h = ContentHasher::new("context");
        h.field(app.as_str());
        h.number(apis.len() as u32);
        // BTreeMap iteration is name-ordered, independent of declaration order.
        for api in apis.values() {
            h.field(api.name.as_str())
                .field(api.id.as_str())
                .field(api.compute.id().as_str());
        }
        ContextId(h.finish())
    }

    pub fn app_name(&self) -> &AppName {
        &self.app.name
    }

    pub fn api(&self, name: &ApiName) -> Option<&Api> {
        self.apis.get(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, model: &str) -> ApiSpec {
        ApiSpec {
            name: ApiName::from(name),
            endpoint: format!("/iris/{name}"),
            model: Some(model.to_string()),
            request_handler: None,
            compute: Compute::default(),
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(AppName::from("iris").to_string(), "iris");
        assert_eq!(ApiName::from("classifier").to_string(), "classifier");
    }

    #[test]
    fn status_display_and_serde() {
        assert_eq!(DeploymentStatus::Updating.to_string(), "updating");
        let json = serde_json::to_string(&DeploymentStatus::Idle).expect("serialize");
        assert_eq!(json, "\"idle\"");
    }

    #[test]
    fn compute_id_tracks_every_field() {
        let base = Compute::default();
        let mut more_cpu = base.clone();
        more_cpu.cpu = "1".to_string();
        let mut with_mem = base.clone();
        with_mem.mem = Some("1Gi".to_string());
        assert_eq!(base.id(), Compute::default().id());
        assert_ne!(base.id(), more_cpu.id());
        assert_ne!(base.id(), with_mem.id());
    }

    #[test]
    fn context_id_ignores_declaration_order() {
        let a = Api::from_spec(spec("a", "s3://m/a"), None);
        let b = Api::from_spec(spec("b", "s3://m/b"), None);
        let forward = Context::new(AppName::from("iris"), None, vec![a.clone(), b.clone()]);
        let backward = Context::new(AppName::from("iris"), None, vec![b, a]);
        assert_eq!(forward.id, backward.id);
        assert_eq!(forward.key, backward.key);
    }

    #[test]
    fn context_id_changes_with_compute_only() {
        let a = Api::from_spec(spec("a", "s3://m/a"), None);
        let mut scaled = a.clone();
        scaled.compute.max_replicas = 3;
        let before = Context::new(AppName::from("iris"), None, vec![a.clone()]);
        let after = Context::new(AppName::from("iris"), None, vec![scaled.clone()]);
        assert_eq!(a.id, scaled.id, "definition id is compute-independent");
        assert!(!a.matches(&scaled));
        assert_ne!(before.id, after.id);
    }

    #[test]
    fn project_id_only_affects_apis_with_handlers() {
        let plain = spec("a", "s3://m/a");
        let mut handled = spec("b", "s3://m/b");
        handled.request_handler = Some("handlers/b.py".to_string());

        let plain_v1 = Api::from_spec(plain.clone(), Some("p1"));
        let plain_v2 = Api::from_spec(plain, Some("p2"));
        let handled_v1 = Api::from_spec(handled.clone(), Some("p1"));
        let handled_v2 = Api::from_spec(handled, Some("p2"));

        assert_eq!(plain_v1.id, plain_v2.id);
        assert_ne!(handled_v1.id, handled_v2.id);
    }

    #[test]
    fn context_serde_roundtrip_keeps_ids() {
        let ctx = Context::new(
            AppName::from("iris"),
            None,
            vec![Api::from_spec(spec("a", "s3://m/a"), None)],
        );
        let json = serde_json::to_string(&ctx).expect("serialize");
        let back: Context = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(ctx, back);
        assert!(ctx.key.starts_with("apps/iris/contexts/"));
    }

    #[test]
    fn cpu_quantities_in_millicores() {
        assert_eq!(cpu_millis("2"), Some(2000));
        assert_eq!(cpu_millis("0.5"), Some(500));
        assert_eq!(cpu_millis("250m"), Some(250));
        assert_eq!(cpu_millis("lots"), None);
        assert_eq!(Compute::default().cpu_millis(), Some(200));
    }

    #[test]
    fn name_rule_rejects_path_like_names() {
        assert!(check_name("iris-v2").is_ok());
        for name in ["", "..", "a/b", "Iris", "iris-", "9lives"] {
            assert!(check_name(name).is_err(), "name {name:?}");
        }
    }
}
