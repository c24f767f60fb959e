//! # rollout-deploy
//!
//! Deploy admission and API diffing.
//!
//! Call [`deploy`] with a [`DeployRequest`] and implementations of the
//! [`DeployOrchestrator`] and [`ContextUploader`] ports. The pure pieces are
//! usable on their own: [`is_equivalent`], [`admit`], [`diff`].

pub mod admission;
pub mod diff;
pub mod equivalence;
pub mod error;
pub mod local;
pub mod message;
pub mod pipeline;
pub mod ports;

pub use admission::{admit, Admission, DeployOptions, RejectReason};
pub use diff::{diff, ApiDiff};
pub use equivalence::{apis_and_computes_match, is_equivalent};
pub use error::{DeployError, ErrorKind, PortError};
pub use local::{FileUploader, LocalOrchestrator, NodeCapacity};
pub use pipeline::{deploy, DeployRequest, DeployResponse};
pub use ports::{ContextUploader, DeployOrchestrator};
