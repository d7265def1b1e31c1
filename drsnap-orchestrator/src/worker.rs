//! Per-VM snapshot creation.

use chrono::{Days, NaiveDate};
use drsnap_config::SnapshotSettings;
use drsnap_provider::{ProviderClient, ProviderError, SnapshotRequest, VmDetail};
use tracing::{info, warn};

use crate::audit::AuditSink;
use crate::record::{snapshot_name, FailureReason, SnapshotRecord, VmRecord};

/// Values shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// `%Y%m%d%H%M%S` of the run start, embedded in snapshot names
    pub timestamp: String,
    pub chg_number: String,
    pub owner_user_id: String,
    pub expiration_date: NaiveDate,
}

/// `today + ttl_days`, or `None` past the representable calendar.
pub fn expiration_date(today: NaiveDate, ttl_days: u32) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(u64::from(ttl_days)))
}

/// A VM whose details were fetched and which is ready for its snapshot.
#[derive(Debug, Clone)]
pub struct PreparedVm {
    pub record: VmRecord,
    pub detail: VmDetail,
}

pub struct SnapshotWorker<'a> {
    provider: &'a dyn ProviderClient,
    sink: &'a dyn AuditSink,
    context: &'a RunContext,
    settings: &'a SnapshotSettings,
}

impl<'a> SnapshotWorker<'a> {
    pub fn new(
        provider: &'a dyn ProviderClient,
        sink: &'a dyn AuditSink,
        context: &'a RunContext,
        settings: &'a SnapshotSettings,
    ) -> Self {
        Self {
            provider,
            sink,
            context,
            settings,
        }
    }

    fn log(&self, entry: &str) {
        if let Err(e) = self.sink.append_log(entry) {
            warn!(error = %e, "Failed to append to run log");
        }
    }

    /// Snapshot the OS disk of `vm` and record it in the registry.
    ///
    /// Never fails as a whole: the result is the VM name paired with either
    /// the snapshot name or the reason it has no snapshot.
    pub async fn create_snapshot(
        &self,
        vm: &PreparedVm,
    ) -> (String, Result<String, FailureReason>) {
        let vm_name = vm.record.name.clone();
        let result = self.snapshot(vm).await;
        (vm_name, result)
    }

    async fn snapshot(&self, vm: &PreparedVm) -> Result<String, FailureReason> {
        let ctx = self.context;
        self.log(&format!("Processing VM: {}", vm.record.name));
        self.log(&format!("Resource ID: {}", vm.record.resource_id));
        self.log(&format!("Resource group: {}", vm.detail.resource_group));
        self.log(&format!("User ID: {}", ctx.owner_user_id));

        let name = snapshot_name(
            &self.settings.name_prefix,
            &ctx.chg_number,
            &vm.record.name,
            &ctx.timestamp,
        );
        let request = SnapshotRequest {
            name: name.clone(),
            resource_group: vm.detail.resource_group.clone(),
            source_disk_id: vm.detail.disk_id.clone(),
            tags: vec![
                ("CreatedByUserId".to_string(), ctx.owner_user_id.clone()),
                ("drtier".to_string(), self.settings.dr_tier.clone()),
            ],
        };

        let response = match self.provider.create_snapshot(&request).await {
            Ok(response) => response,
            Err(ProviderError::MalformedResponse { reason, .. }) => {
                warn!(vm = %vm.record.name, %reason, "Snapshot response is not JSON");
                self.log(&format!("Snapshot created: {}", name));
                self.log(&format!(
                    "Warning: Could not extract snapshot resource ID for {}",
                    name
                ));
                return Err(FailureReason::ExtractSnapshotId);
            }
            Err(e) => {
                warn!(vm = %vm.record.name, error = %e, "Snapshot creation failed");
                self.log(&format!("Failed to create snapshot for VM: {}", vm.record.name));
                self.log(&format!("Error: {}", e.stderr().unwrap_or_default()));
                return Err(FailureReason::CreateSnapshot);
            }
        };

        self.log(&format!("Snapshot created: {}", name));
        let document = serde_json::to_string_pretty(&response.document)
            .unwrap_or_else(|_| response.document.to_string());
        self.log(&document);

        let Some(snapshot_id) = response.id else {
            warn!(snapshot = %name, "Snapshot response carries no id");
            self.log(&format!(
                "Warning: Could not extract snapshot resource ID for {}",
                name
            ));
            return Err(FailureReason::ExtractSnapshotId);
        };

        let record = SnapshotRecord {
            snapshot_id: snapshot_id.clone(),
            snapshot_name: name.clone(),
            expiration_date: ctx.expiration_date,
            owner_user_id: ctx.owner_user_id.clone(),
        };
        if let Err(e) = self.sink.append_snapshot_record(&record) {
            warn!(snapshot = %name, error = %e, "Failed to record snapshot");
            self.log(&format!("Failed to record snapshot ID {}: {}", snapshot_id, e));
            return Err(FailureReason::RecordSnapshot);
        }

        self.log(&format!("Snapshot resource ID added to registry: {}", snapshot_id));
        info!(vm = %vm.record.name, snapshot = %name, "Snapshot created");
        Ok(name)
    }
}
