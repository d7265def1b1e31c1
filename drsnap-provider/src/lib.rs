//! Cloud provider access for drsnap.
//!
//! The provider CLI is the only channel to the cloud. [`ProviderClient`] is the
//! seam the orchestrator depends on; [`AzCliClient`] implements it by building
//! `az` invocations and running them through the retrying command executor.

pub mod client;
pub mod command;
pub mod error;
pub mod models;

pub use client::{AzCliClient, ProviderClient};
pub use command::{AzCommand, AzOps, Idempotency};
pub use error::{ProviderError, ProviderResult};
pub use models::{SnapshotRequest, SnapshotResponse, VmDetail};
