//! `rollout get <app>`: current deployment as reported by the daemon.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use rollout_core::{ApiName, DeploymentStatus};
use rollout_daemon::{request_get, DaemonError};

use super::home;
use super::validate::api_table;

/// Arguments for `rollout get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Application name.
    pub app: String,

    /// Show a single API.
    #[arg(long)]
    pub api: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl GetArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let snapshot = match request_get(&home, &self.app) {
            Ok(snapshot) => snapshot,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                bail!("daemon is not running; start it with `rollout daemon start`")
            }
            Err(err) => return Err(err).with_context(|| format!("failed to get '{}'", self.app)),
        };

        if let Some(api_name) = self.api.as_deref() {
            let api = snapshot
                .context
                .api(&ApiName::from(api_name))
                .with_context(|| format!("api '{api_name}' is not part of {}", self.app))?;
            if self.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(api).context("failed to render api JSON")?
                );
            } else {
                println!("{} {}", "api:".bold(), api.name);
                println!("{} {}", "id:".bold(), api.id);
                println!("{}", api_table([api]));
            }
            return Ok(());
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).context("failed to render JSON")?
            );
            return Ok(());
        }

        let status = match snapshot.status {
            DeploymentStatus::Idle => snapshot.status.to_string().green(),
            DeploymentStatus::Updating => snapshot.status.to_string().yellow(),
        };
        println!("{} {}", "app:".bold(), snapshot.app);
        println!("{} {}", "status:".bold(), status);
        println!(
            "{} {}",
            "deployed:".bold(),
            snapshot.deployed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("{} {}", "context:".bold(), snapshot.context.id);
        println!("{}", api_table(snapshot.context.apis.values()));
        Ok(())
    }
}
