//! `rollout diff`: offline comparison against the current deployment.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rollout_core::store;
use rollout_deploy::{diff, is_equivalent};

use super::InputArgs;

/// Arguments for `rollout diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let current = self.input.load_context()?;
        let app = current.app_name().clone();
        let previous = store::load_current(&app)
            .with_context(|| format!("failed to load current deployment of '{app}'"))?
            .map(|record| record.context);

        if is_equivalent(&current, previous.as_ref()) {
            println!("{app} is up to date");
            return Ok(());
        }

        let changes = diff(previous.as_ref(), &current);
        for api in &changes.created {
            println!("{} {} ({})", "+".green(), api.name, api.endpoint);
        }
        for api in &changes.updated {
            println!("{} {} ({})", "~".yellow(), api.name, api.endpoint);
        }
        for api in &changes.deleted {
            println!("{} {} ({})", "-".red(), api.name, api.endpoint);
        }
        for name in &changes.unchanged {
            println!("{} {}", " ".dimmed(), name.as_str().dimmed());
        }
        println!(
            "\n{} created, {} updated, {} deleted, {} unchanged",
            changes.created.len(),
            changes.updated.len(),
            changes.deleted.len(),
            changes.unchanged.len()
        );
        Ok(())
    }
}
