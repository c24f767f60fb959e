pub mod daemon;
pub mod deploy;
pub mod diff;
pub mod get;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use rollout_config::CONFIG_FILE_NAME;

/// Config document and project archive shared by deploy, diff and validate.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Path to the config document.
    #[arg(long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Project archive referenced by request handlers.
    #[arg(long)]
    pub project: Option<PathBuf>,
}

impl InputArgs {
    pub fn read_config(&self) -> Result<Vec<u8>> {
        read(&self.config)
    }

    pub fn read_project(&self) -> Result<Option<Vec<u8>>> {
        self.project.as_deref().map(read).transpose()
    }

    /// Build the context exactly as the daemon would.
    pub fn load_context(&self) -> Result<rollout_core::Context> {
        let config = self.read_config()?;
        let project = self.read_project()?;
        rollout_config::load_context(
            &self.config.display().to_string(),
            &config,
            project.as_deref(),
        )
        .with_context(|| format!("invalid config {}", self.config.display()))
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}
