//! `rollout validate`: parse, validate and show the resulting context.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rollout_core::Api;

use super::InputArgs;

/// Arguments for `rollout validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Tabled)]
pub(crate) struct ApiRow {
    #[tabled(rename = "api")]
    name: String,
    #[tabled(rename = "endpoint")]
    endpoint: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "replicas")]
    replicas: String,
    #[tabled(rename = "cpu")]
    cpu: String,
    #[tabled(rename = "mem")]
    mem: String,
    #[tabled(rename = "gpu")]
    gpu: u32,
}

impl From<&Api> for ApiRow {
    fn from(api: &Api) -> Self {
        let source = match (&api.model, &api.request_handler) {
            (Some(model), Some(handler)) => format!("{model} + {handler}"),
            (Some(model), None) => model.clone(),
            (None, Some(handler)) => handler.clone(),
            (None, None) => "-".to_string(),
        };
        let compute = &api.compute;
        Self {
            name: api.name.to_string(),
            endpoint: api.endpoint.clone(),
            source,
            replicas: format!(
                "{}..{} (init {})",
                compute.min_replicas, compute.max_replicas, compute.init_replicas
            ),
            cpu: compute.cpu.clone(),
            mem: compute.mem.clone().unwrap_or_else(|| "-".to_string()),
            gpu: compute.gpu,
        }
    }
}

pub(crate) fn api_table<'a>(apis: impl IntoIterator<Item = &'a Api>) -> String {
    let rows: Vec<ApiRow> = apis.into_iter().map(ApiRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

impl ValidateArgs {
    pub fn run(self) -> Result<()> {
        let context = self.input.load_context()?;
        println!(
            "{} {} is valid",
            "✓".green(),
            self.input.config.display()
        );
        println!("{} {}", "app:".bold(), context.app.name);
        println!("{} {}", "context:".bold(), context.id);
        println!("{}", api_table(context.apis.values()));
        Ok(())
    }
}
