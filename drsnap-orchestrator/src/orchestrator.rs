//! The run state machine.
//!
//! Authenticate, resolve the host list against the inventory, then walk the
//! subscription groups one at a time: switch the active subscription, fetch
//! VM details sequentially, and fan the snapshot workers out with bounded
//! concurrency. Groups never overlap because the active subscription is
//! process-wide state of the provider CLI.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use drsnap_config::AppConfig;
use drsnap_provider::ProviderClient;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::audit::{AuditSink, FileAuditSink, RunSummary};
use crate::error::{Result, RunError};
use crate::grouping::group_by_subscription;
use crate::inventory::{resolve, FileInventory, HostList, Resolution};
use crate::outcome::{CompletedRun, RunOutcome, RunParams, RunPhase, RunReport};
use crate::record::{FailureReason, VmRecord};
use crate::worker::{expiration_date, PreparedVm, RunContext, SnapshotWorker};

/// `%Y%m%d%H%M%S`, shared by file names and snapshot names of a run.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Subscription groups a run would process, without touching the provider.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub groups: Vec<PlannedGroup>,
    pub malformed: Vec<VmRecord>,
    pub excluded: Vec<String>,
    pub not_found: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedGroup {
    pub subscription_id: String,
    pub vms: Vec<VmRecord>,
}

impl RunPlan {
    pub fn total_vms(&self) -> usize {
        self.groups.iter().map(|g| g.vms.len()).sum::<usize>() + self.malformed.len()
    }
}

pub struct Orchestrator {
    provider: Arc<dyn ProviderClient>,
    config: AppConfig,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ProviderClient>, config: AppConfig) -> Self {
        Self { provider, config }
    }

    /// Execute a run with the file-backed audit trail from the configuration.
    pub async fn run(&self, params: &RunParams) -> Result<RunReport> {
        params.validate()?;

        let timestamp = Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();
        let sink = FileAuditSink::create(
            &self.config.log_dir,
            &self.config.registry_file,
            &timestamp,
        )?;

        let run = self.execute(params, &timestamp, &sink).await?;
        Ok(RunReport::new(
            run,
            sink.log_path().to_path_buf(),
            sink.summary_path().to_path_buf(),
            sink.registry_path().to_path_buf(),
        ))
    }

    /// Execute a run against an arbitrary sink.
    pub async fn execute(
        &self,
        params: &RunParams,
        timestamp: &str,
        sink: &dyn AuditSink,
    ) -> Result<CompletedRun> {
        let span = info_span!("run", chg = %params.chg_number, timestamp);
        self.execute_inner(params, timestamp, sink).instrument(span).await
    }

    async fn execute_inner(
        &self,
        params: &RunParams,
        timestamp: &str,
        sink: &dyn AuditSink,
    ) -> Result<CompletedRun> {
        params.validate()?;
        let expires = expiration_date(Local::now().date_naive(), params.ttl_days)
            .ok_or_else(|| {
                RunError::InvalidParams(format!("TTL of {} days is out of range", params.ttl_days))
            })?;

        log_entry(sink, &format!("CHG Number: {}", params.chg_number));
        log_entry(sink, &format!("Snapshot Time-to-Live: {} days", params.ttl_days));

        debug!(phase = %RunPhase::Authenticating);
        let owner_user_id = self
            .provider
            .current_user()
            .await
            .map_err(RunError::NoIdentity)?;
        log_entry(sink, &format!("User ID: {}", owner_user_id));
        info!(user = %owner_user_id, "Authenticated");

        debug!(phase = %RunPhase::ResolvingInventory);
        let resolution = self.resolve_hosts(&params.host_file, &params.exclude_keywords)?;
        if !resolution.excluded.is_empty() {
            log_entry(
                sink,
                &format!("Excluded VMs based on keywords: {}", resolution.excluded.join(", ")),
            );
        }
        let Resolution {
            records,
            excluded,
            mut not_found,
            unparseable,
        } = resolution;
        not_found.extend(unparseable);
        for host in &not_found {
            log_entry(sink, &format!("Information not found for hostname: {}", host));
        }
        if records.is_empty() {
            return Err(RunError::NoVmsResolved);
        }

        let mut outcome = RunOutcome::new(records.len());
        let grouped = group_by_subscription(records);
        info!(
            vms = outcome.total_vms,
            subscriptions = grouped.groups.len(),
            "Resolved inventory"
        );

        for (record, error) in grouped.malformed {
            warn!(vm = %record.name, %error, "Skipping VM with malformed resource id");
            log_entry(sink, &error.to_string());
            outcome.record_failure(record.name, FailureReason::MalformedResourceId);
        }

        let context = RunContext {
            timestamp: timestamp.to_string(),
            chg_number: params.chg_number.clone(),
            owner_user_id: owner_user_id.clone(),
            expiration_date: expires,
        };

        for (subscription_id, vms) in &grouped.groups {
            let span = info_span!("subscription", subscription = %subscription_id);
            self.process_group(subscription_id, vms, &context, sink, &mut outcome)
                .instrument(span)
                .await;
        }

        debug!(phase = %RunPhase::Summarizing);
        let summary_written = match sink.write_summary(&RunSummary {
            chg_number: &params.chg_number,
            ttl_days: params.ttl_days,
            outcome: &outcome,
            excluded: &excluded,
            not_found: &not_found,
        }) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to write run summary");
                log_entry(sink, &format!("Failed to write summary: {}", e));
                false
            }
        };

        info!(
            total = outcome.total_vms,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            phase = %RunPhase::Done,
            "Run complete"
        );

        Ok(CompletedRun {
            timestamp: timestamp.to_string(),
            owner_user_id,
            outcome,
            excluded,
            not_found,
            summary_written,
        })
    }

    async fn process_group(
        &self,
        subscription_id: &str,
        vms: &[VmRecord],
        context: &RunContext,
        sink: &dyn AuditSink,
        outcome: &mut RunOutcome,
    ) {
        debug!(phase = %RunPhase::SwitchingContext);
        if let Err(e) = self.provider.set_subscription(subscription_id).await {
            warn!(error = %e, "Failed to switch subscription; failing its VMs");
            log_entry(sink, &format!("Failed to set subscription ID: {}", subscription_id));
            log_entry(sink, &format!("Error: {}", e.stderr().unwrap_or_default()));
            for vm in vms {
                outcome.record_failure(vm.name.clone(), FailureReason::SetSubscription);
            }
            return;
        }
        log_entry(sink, &format!("Switched to subscription: {}", subscription_id));

        debug!(phase = %RunPhase::FetchingDetails);
        let mut prepared = Vec::with_capacity(vms.len());
        for vm in vms {
            match self.provider.vm_details(&vm.resource_id).await {
                Ok(detail) => prepared.push(PreparedVm {
                    record: vm.clone(),
                    detail,
                }),
                Err(e) => {
                    warn!(vm = %vm.name, error = %e, "Failed to get VM details");
                    log_entry(sink, &format!("Failed to get VM details for {}", vm.name));
                    let detail = e.stderr().map(str::to_string).unwrap_or_else(|| e.to_string());
                    log_entry(sink, &format!("Error: {}", detail));
                    outcome.record_failure(vm.name.clone(), FailureReason::VmDetails);
                }
            }
        }

        debug!(phase = %RunPhase::CreatingSnapshots, vms = prepared.len());
        let worker = SnapshotWorker::new(
            self.provider.as_ref(),
            sink,
            context,
            &self.config.snapshot,
        );
        let results: Vec<_> = stream::iter(prepared.iter().map(|vm| {
            let span = info_span!("vm", vm = %vm.record.name);
            worker.create_snapshot(vm).instrument(span)
        }))
        .buffer_unordered(self.config.concurrency())
        .collect()
        .await;

        for (vm_name, result) in results {
            outcome.record(vm_name, result);
        }
    }

    /// Resolve and group the host list without contacting the provider.
    pub fn plan(&self, host_file: &Path, exclude_keywords: &[String]) -> Result<RunPlan> {
        let resolution = self.resolve_hosts(host_file, exclude_keywords)?;
        let grouped = group_by_subscription(resolution.records);

        let mut not_found = resolution.not_found;
        not_found.extend(resolution.unparseable);

        Ok(RunPlan {
            groups: grouped
                .groups
                .into_iter()
                .map(|(subscription_id, vms)| PlannedGroup {
                    subscription_id,
                    vms,
                })
                .collect(),
            malformed: grouped.malformed.into_iter().map(|(vm, _)| vm).collect(),
            excluded: resolution.excluded,
            not_found,
        })
    }

    fn resolve_hosts(&self, host_file: &Path, exclude_keywords: &[String]) -> Result<Resolution> {
        let hosts = HostList::load(host_file).map_err(|source| RunError::HostListUnreadable {
            path: host_file.to_path_buf(),
            source,
        })?;
        let inventory = FileInventory::load(&self.config.inventory_file).map_err(|source| {
            RunError::InventoryUnreadable {
                path: self.config.inventory_file.clone(),
                source,
            }
        })?;

        Ok(resolve(hosts.hostnames(), &inventory, exclude_keywords))
    }
}

fn log_entry(sink: &dyn AuditSink, entry: &str) {
    if let Err(e) = sink.append_log(entry) {
        warn!(error = %e, "Failed to append to run log");
    }
}
