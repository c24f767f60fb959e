//! Local rollout operator: socket server, per-application deploy locks, settling.

pub mod config;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use config::DaemonConfig;
pub use error::DaemonError;
pub use protocol::{
    request_deploy, request_get, request_status, request_stop, send_request, AppSnapshot,
    DaemonRequest, DaemonResponse,
};
pub use runtime::{run, start_blocking};
