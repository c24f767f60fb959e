//! # rollout-config
//!
//! Parses and validates the declarative `rollout.yaml` document and builds a
//! [`Context`](rollout_core::Context) from it.
//!
//! ```rust,no_run
//! use rollout_config::{load_context, CONFIG_FILE_NAME};
//!
//! fn build(yaml: &[u8]) {
//!     match load_context(CONFIG_FILE_NAME, yaml, None) {
//!         Ok(ctx) => println!("{} -> {}", ctx.app.name, ctx.id),
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod schema;

pub use context::{build_context, load_context};
pub use error::ConfigError;
pub use schema::{ApiConfig, AppConfig, ComputeConfig, UserConfig};

/// Name of the declarative config document inside a deploy submission.
pub const CONFIG_FILE_NAME: &str = "rollout.yaml";
