//! In-process port implementations backed by the `~/.rollout/` store.
//!
//! [`LocalOrchestrator`] keeps deployment status in memory. A run persists
//! the context as the application's current context, then flips the status to
//! `Updating` and bumps a per-application generation under one lock. Whoever
//! drives settling calls [`LocalOrchestrator::settle`] with the generation it
//! observed; a newer run invalidates older settle attempts.
//!
//! Deploy validation checks every API's per-replica request against the
//! configured [`NodeCapacity`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rollout_core::{store, Api, AppName, Context, DeploymentStatus};

use crate::error::PortError;
use crate::ports::{ContextUploader, DeployOrchestrator};

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

/// Writes uploaded contexts to `<home>/.rollout/store/<key>`.
#[derive(Debug, Clone)]
pub struct FileUploader {
    home: PathBuf,
}

impl FileUploader {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl ContextUploader for FileUploader {
    fn upload_context(&self, context: &Context, key: &str) -> Result<(), PortError> {
        store::upload_at(&self.home, context, key)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Largest single node an API replica can be scheduled on. `None` is unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCapacity {
    pub cpu_millis: Option<u64>,
    pub gpu: Option<u32>,
}

impl NodeCapacity {
    fn check(&self, api: &Api) -> Result<(), PortError> {
        let compute = &api.compute;
        if let Some(limit) = self.cpu_millis {
            let requested = compute.cpu_millis().ok_or_else(|| {
                PortError::Invalid(format!(
                    "api '{}': cpu quantity '{}' is not understood",
                    api.name, compute.cpu
                ))
            })?;
            if requested > limit {
                return Err(PortError::Invalid(format!(
                    "api '{}' requests {requested}m cpu per replica but nodes provide at most {limit}m",
                    api.name
                )));
            }
        }
        if let Some(limit) = self.gpu {
            if compute.gpu > limit {
                return Err(PortError::Invalid(format!(
                    "api '{}' requests {} gpu per replica but nodes provide at most {limit}",
                    api.name, compute.gpu
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AppState {
    status: DeploymentStatus,
    generation: u64,
}

#[derive(Debug)]
pub struct LocalOrchestrator {
    home: PathBuf,
    apis_base_url: String,
    capacity: NodeCapacity,
    states: Mutex<HashMap<AppName, AppState>>,
}

impl LocalOrchestrator {
    pub fn new(home: impl Into<PathBuf>, apis_base_url: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            apis_base_url: apis_base_url.into(),
            capacity: NodeCapacity::default(),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_capacity(mut self, capacity: NodeCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Number of runs started for `app` since this orchestrator was created.
    pub fn generation(&self, app: &AppName) -> u64 {
        self.lock().get(app).map(|s| s.generation).unwrap_or(0)
    }

    /// Mark `app` idle if no run newer than `generation` started.
    ///
    /// Returns `true` when the status changed.
    pub fn settle(&self, app: &AppName, generation: u64) -> bool {
        let mut states = self.lock();
        match states.get_mut(app) {
            Some(state)
                if state.generation == generation
                    && state.status == DeploymentStatus::Updating =>
            {
                state.status = DeploymentStatus::Idle;
                tracing::info!(app = %app, generation, "deployment settled");
                true
            }
            _ => false,
        }
    }

    /// Status of every application seen by this orchestrator, sorted by name.
    pub fn statuses(&self) -> Vec<(AppName, DeploymentStatus)> {
        let mut out: Vec<_> = self
            .lock()
            .iter()
            .map(|(app, state)| (app.clone(), state.status))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AppName, AppState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeployOrchestrator for LocalOrchestrator {
    fn run(&self, context: &Context) -> Result<(), PortError> {
        let app = context.app_name();
        let mut states = self.lock();
        store::save_current_at(&self.home, context)?;
        let state = states.entry(app.clone()).or_default();
        state.status = DeploymentStatus::Updating;
        state.generation += 1;
        tracing::info!(
            app = %app,
            context_id = %context.id,
            generation = state.generation,
            "deployment updating",
        );
        Ok(())
    }

    fn validate_deploy(&self, context: &Context) -> Result<(), PortError> {
        context.apis.values().try_for_each(|api| self.capacity.check(api))
    }

    fn deployment_status(&self, app: &AppName) -> Result<DeploymentStatus, PortError> {
        Ok(self.lock().get(app).map(|s| s.status).unwrap_or_default())
    }

    fn current_context(&self, app: &AppName) -> Result<Option<Context>, PortError> {
        Ok(store::load_current_at(&self.home, app)?.map(|record| record.context))
    }

    fn apis_base_url(&self) -> Result<String, PortError> {
        Ok(self.apis_base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_core::{ApiName, ApiSpec, Compute};
    use tempfile::TempDir;

    fn ctx_with(model: &str, compute: Compute) -> Context {
        let api = Api::from_spec(
            ApiSpec {
                name: ApiName::from("a"),
                endpoint: "/iris/a".to_string(),
                model: Some(model.to_string()),
                request_handler: None,
                compute,
            },
            None,
        );
        Context::new(AppName::from("iris"), None, vec![api])
    }

    fn ctx(model: &str) -> Context {
        ctx_with(model, Compute::default())
    }

    #[test]
    fn unknown_app_is_idle_without_context() {
        let home = TempDir::new().expect("home");
        let orch = LocalOrchestrator::new(home.path(), "http://localhost:8888");
        let app = AppName::from("iris");
        assert_eq!(orch.deployment_status(&app).expect("status"), DeploymentStatus::Idle);
        assert!(orch.current_context(&app).expect("ctx").is_none());
    }

    #[test]
    fn run_records_context_and_marks_updating() {
        let home = TempDir::new().expect("home");
        let orch = LocalOrchestrator::new(home.path(), "http://localhost:8888");
        let c = ctx("v1");
        orch.run(&c).expect("run");

        let app = c.app_name();
        assert_eq!(orch.deployment_status(app).expect("status"), DeploymentStatus::Updating);
        assert_eq!(orch.current_context(app).expect("ctx"), Some(c.clone()));
        assert_eq!(orch.generation(app), 1);
    }

    #[test]
    fn stale_settle_is_ignored() {
        let home = TempDir::new().expect("home");
        let orch = LocalOrchestrator::new(home.path(), "http://localhost:8888");
        let first = ctx("v1");
        let app = first.app_name().clone();

        orch.run(&first).expect("run first");
        let stale = orch.generation(&app);
        orch.run(&ctx("v2")).expect("run second");

        assert!(!orch.settle(&app, stale), "older generation must not settle");
        assert_eq!(orch.deployment_status(&app).expect("status"), DeploymentStatus::Updating);
        assert!(orch.settle(&app, orch.generation(&app)));
        assert_eq!(orch.deployment_status(&app).expect("status"), DeploymentStatus::Idle);
    }

    #[test]
    fn file_uploader_writes_under_key() {
        let home = TempDir::new().expect("home");
        let c = ctx("v1");
        FileUploader::new(home.path())
            .upload_context(&c, &c.key)
            .expect("upload");
        let loaded = store::load_uploaded_at(home.path(), &c.key).expect("load");
        assert_eq!(loaded.id, c.id);
    }

    #[test]
    fn unlimited_capacity_accepts_any_request() {
        let home = TempDir::new().expect("home");
        let orch = LocalOrchestrator::new(home.path(), "http://localhost:8888");
        let big = Compute {
            cpu: "64".to_string(),
            gpu: 8,
            ..Compute::default()
        };
        orch.validate_deploy(&ctx_with("v1", big)).expect("valid");
    }

    #[test]
    fn requests_over_node_capacity_are_refused() {
        let home = TempDir::new().expect("home");
        let orch = LocalOrchestrator::new(home.path(), "http://localhost:8888").with_capacity(
            NodeCapacity {
                cpu_millis: Some(1000),
                gpu: Some(1),
            },
        );

        orch.validate_deploy(&ctx("v1")).expect("200m fits");

        let cpu_heavy = Compute {
            cpu: "1.5".to_string(),
            ..Compute::default()
        };
        let err = orch.validate_deploy(&ctx_with("v1", cpu_heavy)).unwrap_err();
        assert!(err.to_string().contains("1500m"), "got: {err}");

        let gpu_heavy = Compute {
            gpu: 2,
            ..Compute::default()
        };
        let err = orch.validate_deploy(&ctx_with("v1", gpu_heavy)).unwrap_err();
        assert!(matches!(err, PortError::Invalid(_)), "got: {err}");
    }
}
