//! Run parameters, phases and the aggregated outcome of a run.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Result, RunError};
use crate::record::FailureReason;

/// Inputs of one snapshot run, as supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub host_file: PathBuf,
    pub chg_number: String,
    pub ttl_days: u32,
    pub exclude_keywords: Vec<String>,
}

impl RunParams {
    /// The change number is embedded in provider resource names, so it must
    /// be a single path-safe token.
    pub fn validate(&self) -> Result<()> {
        let chg = self.chg_number.as_str();
        if chg.is_empty() {
            return Err(RunError::InvalidParams(
                "change number must not be empty".to_string(),
            ));
        }
        if chg.contains(char::is_whitespace) || chg.contains('/') {
            return Err(RunError::InvalidParams(format!(
                "change number '{}' must not contain whitespace or '/'",
                chg
            )));
        }
        if self.ttl_days == 0 {
            return Err(RunError::InvalidParams(
                "TTL must be at least 1 day".to_string(),
            ));
        }
        Ok(())
    }
}

/// States of a run. Terminal failure is a [`RunError`] returned from the
/// phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Authenticating,
    ResolvingInventory,
    SwitchingContext,
    FetchingDetails,
    CreatingSnapshots,
    Summarizing,
    Done,
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authenticating => "authenticating",
            Self::ResolvingInventory => "resolving inventory",
            Self::SwitchingContext => "switching subscription",
            Self::FetchingDetails => "fetching VM details",
            Self::CreatingSnapshots => "creating snapshots",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SucceededVm {
    pub vm_name: String,
    pub snapshot_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedVm {
    pub vm_name: String,
    pub reason: FailureReason,
}

/// Per-VM results of a run. Every resolved VM lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub total_vms: usize,
    pub succeeded: Vec<SucceededVm>,
    pub failed: Vec<FailedVm>,
}

impl RunOutcome {
    pub fn new(total_vms: usize) -> Self {
        Self {
            total_vms,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, vm_name: impl Into<String>, snapshot_name: impl Into<String>) {
        self.succeeded.push(SucceededVm {
            vm_name: vm_name.into(),
            snapshot_name: snapshot_name.into(),
        });
    }

    pub fn record_failure(&mut self, vm_name: impl Into<String>, reason: FailureReason) {
        self.failed.push(FailedVm {
            vm_name: vm_name.into(),
            reason,
        });
    }

    /// Fold a worker result into the outcome.
    pub fn record(&mut self, vm_name: String, result: std::result::Result<String, FailureReason>) {
        match result {
            Ok(snapshot_name) => self.record_success(vm_name, snapshot_name),
            Err(reason) => self.record_failure(vm_name, reason),
        }
    }

    /// `succeeded + failed == total`
    pub fn is_balanced(&self) -> bool {
        self.succeeded.len() + self.failed.len() == self.total_vms
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Outcome plus the inventory diagnostics gathered on the way.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun {
    pub timestamp: String,
    pub owner_user_id: String,
    pub outcome: RunOutcome,
    pub excluded: Vec<String>,
    pub not_found: Vec<String>,
    /// False when the summary file could not be written; the outcome and the
    /// registry entries are still valid.
    pub summary_written: bool,
}

/// What a caller gets back from a run: counts, details and file locations.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total_vms: usize,
    pub successful_snapshots: usize,
    pub failed_snapshots: usize,
    pub log_file: PathBuf,
    pub summary_file: PathBuf,
    pub snap_rid_list_file: PathBuf,
    pub run: CompletedRun,
}

impl RunReport {
    pub fn new(
        run: CompletedRun,
        log_file: PathBuf,
        summary_file: PathBuf,
        snap_rid_list_file: PathBuf,
    ) -> Self {
        Self {
            total_vms: run.outcome.total_vms,
            successful_snapshots: run.outcome.succeeded.len(),
            failed_snapshots: run.outcome.failed.len(),
            log_file,
            summary_file,
            snap_rid_list_file,
            run,
        }
    }
}
