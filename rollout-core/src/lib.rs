//! Rollout core library: context model, content identity, durable store.
//!
//! - [`types`]: newtypes and the [`Context`] snapshot
//! - [`identity`]: SHA-256 content hashing for context, API and compute IDs
//! - [`store`]: atomic file-backed persistence of contexts
//! - [`error`]: [`StoreError`]

pub mod error;
pub mod identity;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::ContextRecord;
pub use types::{
    Api, ApiId, ApiName, ApiSpec, App, AppName, Compute, ComputeId, Context, ContextId,
    DeploymentStatus,
};
