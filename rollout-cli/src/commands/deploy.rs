//! `rollout deploy`: submit the config to the daemon.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use rollout_daemon::{request_deploy, DaemonError};
use rollout_deploy::{Admission, DeployOptions};

use super::{home, InputArgs};

/// Arguments for `rollout deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Replace a different deployment that is still updating.
    #[arg(long)]
    pub force: bool,

    /// Report the API changes even when nothing changed.
    #[arg(long)]
    pub ignore_cache: bool,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let config = String::from_utf8(self.input.read_config()?)
            .with_context(|| format!("{} is not valid UTF-8", self.input.config.display()))?;
        let project = self.input.read_project()?;
        let options = DeployOptions {
            force: self.force,
            ignore_cache: self.ignore_cache,
        };

        let response = match request_deploy(&home, config, project.as_deref(), options) {
            Ok(response) => response,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                bail!("daemon is not running; start it with `rollout daemon start`")
            }
            Err(err) => return Err(err).context("deploy failed"),
        };

        match response.outcome {
            Admission::Proceed => {
                println!("{}", response.message);
                if let Some(url) = response.apis_base_url {
                    println!("\n{} {}", "apis:".bold(), url);
                }
            }
            Admission::Reject(_) => println!("{}", response.message.yellow()),
        }
        Ok(())
    }
}
