//! Human-readable deploy response messages.

use rollout_core::{ApiName, AppName, Context};

use crate::admission::RejectReason;
use crate::diff::ApiDiff;

pub fn up_to_date(app: &AppName) -> String {
    format!("{app} is up to date")
}

pub fn up_to_date_updating(app: &AppName) -> String {
    format!("{app} is up to date and is currently updating")
}

pub fn different_deployment_updating(app: &AppName) -> String {
    format!(
        "a different deployment of {app} is currently updating; \
         run again with --force to replace it"
    )
}

pub fn creating_api(name: &ApiName) -> String {
    format!("creating {name} api")
}

pub fn updating_api(name: &ApiName) -> String {
    format!("updating {name} api")
}

pub fn deleting_api(name: &ApiName) -> String {
    format!("deleting {name} api")
}

pub fn reject(reason: RejectReason, app: &AppName) -> String {
    match reason {
        RejectReason::UpToDateUpdating => up_to_date_updating(app),
        RejectReason::DifferentDeploymentUpdating => different_deployment_updating(app),
    }
}

/// One line per created, updated, then deleted API.
pub fn diff_summary(diff: &ApiDiff) -> String {
    if diff.is_empty() {
        return "no api changes".to_string();
    }
    let lines: Vec<String> = diff
        .created
        .iter()
        .map(|api| creating_api(&api.name))
        .chain(diff.updated.iter().map(|api| updating_api(&api.name)))
        .chain(diff.deleted.iter().map(|api| deleting_api(&api.name)))
        .collect();
    lines.join("\n")
}

/// Append the "next steps" hint block to `base`.
///
/// The hint names the single updating API, else the context's only API,
/// else a `<api_name>` placeholder.
pub fn with_next_steps(base: &str, context: &Context, updating: &[ApiName]) -> String {
    let app = context.app_name();
    let api_name = match (updating, context.apis.len()) {
        ([only], _) => only.to_string(),
        ([], 1) => context
            .apis
            .keys()
            .next()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<api_name>".to_string()),
        _ => "<api_name>".to_string(),
    };

    let rows = [
        (format!("rollout get {app}"), "(show deployment status)"),
        (
            format!("rollout get {app} --api {api_name}"),
            "(show api info)",
        ),
    ];
    let width = rows.iter().map(|(cmd, _)| cmd.len()).max().unwrap_or(0);
    let hints: Vec<String> = rows
        .iter()
        .map(|(cmd, note)| format!("{cmd:<width$}  {note}"))
        .collect();

    format!("{base}\n\n{}", hints.join("\n"))
}
