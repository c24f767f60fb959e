//! Collaborator interfaces consumed by the deploy pipeline.
//!
//! Every call is blocking and fallible from the pipeline's point of view and
//! is never retried by it.

use rollout_core::{AppName, Context, DeploymentStatus};

use crate::error::PortError;

/// Persists and runs accepted contexts and owns per-application status.
///
/// Implementations must make the transition to [`DeploymentStatus::Updating`]
/// inside [`run`](Self::run) atomic with respect to concurrent deploys of the
/// same application; the pipeline itself only reads status.
pub trait DeployOrchestrator {
    /// Start applying `context`. Not idempotent: call once per accepted context.
    fn run(&self, context: &Context) -> Result<(), PortError>;

    /// Deploy-time checks the config document cannot express, such as
    /// whether each API's resource request fits the cluster.
    fn validate_deploy(&self, context: &Context) -> Result<(), PortError>;

    fn deployment_status(&self, app: &AppName) -> Result<DeploymentStatus, PortError>;

    /// The application's current context; `None` if it was never deployed.
    fn current_context(&self, app: &AppName) -> Result<Option<Context>, PortError>;

    /// Base URL under which API endpoints are served.
    fn apis_base_url(&self) -> Result<String, PortError>;
}

/// Durable write of an accepted context, performed before [`DeployOrchestrator::run`].
pub trait ContextUploader {
    fn upload_context(&self, context: &Context, key: &str) -> Result<(), PortError>;
}
