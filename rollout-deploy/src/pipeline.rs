//! Deploy pipeline: build → compare → admit → upload → run → summarize.
//!
//! ## Ordering
//!
//! 1. Require and parse the config document, build the current context.
//! 2. Fetch the previous context and check equivalence.
//! 3. Let the orchestrator validate the context. Failure is an input error.
//! 4. Read deployment status and apply admission.
//! 5. On proceed: upload durably, then run. A failed upload never reaches `run`.
//! 6. Diff previous against current and compose the message.

use serde::{Deserialize, Serialize};

use rollout_config::{load_context, CONFIG_FILE_NAME};
use rollout_core::{Context, DeploymentStatus};

use crate::admission::{admit, Admission, DeployOptions};
use crate::diff::{diff, ApiDiff};
use crate::equivalence::is_equivalent;
use crate::error::DeployError;
use crate::message;
use crate::ports::{ContextUploader, DeployOrchestrator};

/// One deploy submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployRequest {
    /// The `rollout.yaml` document. Required.
    pub config: Option<Vec<u8>>,
    /// Optional project archive referenced by request handlers.
    pub project: Option<Vec<u8>>,
    pub options: DeployOptions,
}

/// Result of a deploy attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub outcome: Admission,
    pub message: String,
    /// The accepted context. `None` on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apis_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<ApiDiff>,
}

/// Run one deploy attempt against the given collaborators.
///
/// Errors short-circuit; nothing is retried here.
pub fn deploy<O, U>(
    request: &DeployRequest,
    orchestrator: &O,
    uploader: &U,
) -> Result<DeployResponse, DeployError>
where
    O: DeployOrchestrator + ?Sized,
    U: ContextUploader + ?Sized,
{
    let config = request
        .config
        .as_deref()
        .filter(|bytes| !bytes.is_empty())
        .ok_or(DeployError::MissingRequiredInput {
            name: CONFIG_FILE_NAME,
        })?;
    let project = request.project.as_deref();
    let ctx = load_context(CONFIG_FILE_NAME, config, project)?;
    let app = ctx.app_name().clone();

    let previous = orchestrator
        .current_context(&app)
        .map_err(|source| DeployError::Lookup {
            app: app.clone(),
            what: "current context",
            source,
        })?;
    let equivalent = is_equivalent(&ctx, previous.as_ref());

    orchestrator
        .validate_deploy(&ctx)
        .map_err(|source| DeployError::InvalidDeploy {
            app: app.clone(),
            source,
        })?;

    let status = orchestrator
        .deployment_status(&app)
        .map_err(|source| DeployError::Lookup {
            app: app.clone(),
            what: "deployment status",
            source,
        })?;

    let admission = admit(status, equivalent, &request.options);
    tracing::info!(
        app = %app,
        context_id = %ctx.id,
        status = %status,
        equivalent,
        force = request.options.force,
        outcome = ?admission,
        "deploy admission decided",
    );

    if let Admission::Reject(reason) = admission {
        let base = message::reject(reason, &app);
        return Ok(DeployResponse {
            outcome: admission,
            message: message::with_next_steps(&base, &ctx, &[]),
            context: None,
            apis_base_url: None,
            diff: None,
        });
    }

    uploader
        .upload_context(&ctx, &ctx.key)
        .map_err(|source| DeployError::Persistence {
            app: app.clone(),
            source,
        })?;
    tracing::debug!(app = %app, key = %ctx.key, "context uploaded");

    orchestrator
        .run(&ctx)
        .map_err(|source| DeployError::Orchestration {
            app: app.clone(),
            source,
        })?;

    let apis_base_url = orchestrator
        .apis_base_url()
        .map_err(|source| DeployError::Lookup {
            app: app.clone(),
            what: "apis base url",
            source,
        })?;

    let api_diff = diff(previous.as_ref(), &ctx);
    let (base, updating) =
        if status == DeploymentStatus::Idle && !request.options.ignore_cache && equivalent {
            (message::up_to_date(&app), Vec::new())
        } else {
            (message::diff_summary(&api_diff), api_diff.updating_apis())
        };
    tracing::info!(
        app = %app,
        created = api_diff.created.len(),
        updated = api_diff.updated.len(),
        deleted = api_diff.deleted.len(),
        "deployment started",
    );

    Ok(DeployResponse {
        outcome: admission,
        message: message::with_next_steps(&base, &ctx, &updating),
        context: Some(ctx),
        apis_base_url: Some(apis_base_url),
        diff: Some(api_diff),
    })
}
