//! Bulk disaster-recovery snapshot orchestration.
//!
//! A run resolves a host list against the VM inventory, groups the VMs by
//! subscription and snapshots each VM's OS disk through a
//! [`drsnap_provider::ProviderClient`]. Every VM ends up either succeeded or
//! failed with a reason; the audit trail (run log, snapshot registry and
//! summary) is written through an [`AuditSink`].

pub mod audit;
pub mod error;
pub mod grouping;
pub mod inventory;
pub mod orchestrator;
pub mod outcome;
pub mod record;
pub mod worker;

pub use audit::{render_summary, AuditSink, FileAuditSink, RunSummary};
pub use error::{Result, RunError};
pub use grouping::{group_by_subscription, SubscriptionGroups};
pub use inventory::{resolve, FileInventory, HostList, InventoryLookup, Resolution};
pub use orchestrator::{Orchestrator, PlannedGroup, RunPlan, RUN_TIMESTAMP_FORMAT};
pub use outcome::{
    CompletedRun, FailedVm, RunOutcome, RunParams, RunPhase, RunReport, SucceededVm,
};
pub use record::{
    extract_subscription_id, snapshot_name, FailureReason, ResourceIdError, SnapshotRecord,
    VmRecord,
};
pub use worker::{PreparedVm, RunContext, SnapshotWorker};
