//! Rollout: declarative deploys with admission control.
//!
//! # Usage
//!
//! ```text
//! rollout deploy [--config rollout.yaml] [--project archive.zip] [--force] [--ignore-cache]
//! rollout diff [--config rollout.yaml] [--project archive.zip]
//! rollout validate [--config rollout.yaml] [--project archive.zip]
//! rollout get <app> [--api <name>] [--json]
//! rollout daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, deploy::DeployArgs, diff::DiffArgs, get::GetArgs,
    validate::ValidateArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "rollout",
    version,
    about = "Deploy model-serving APIs from a declarative config",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit the config to the local daemon for deployment.
    Deploy(DeployArgs),

    /// Show what a deploy would create, update, and delete. Nothing is written.
    Diff(DiffArgs),

    /// Parse and validate the config without deploying.
    Validate(ValidateArgs),

    /// Show the current deployment of an application.
    Get(GetArgs),

    /// Manage the local rollout daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Deploy(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::Get(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
