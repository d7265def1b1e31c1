//! End-to-end runs against a scripted provider CLI and a temporary file tree.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drsnap_config::{AppConfig, RetrySettings};
use drsnap_core::error::{Result as SnapResult, SnapError};
use drsnap_core::scripted::ScriptedRunner;
use drsnap_core::{CommandExecutor, CommandResult};
use drsnap_orchestrator::{
    AuditSink, FailureReason, FileAuditSink, Orchestrator, RunError, RunParams, RunPhase,
    RunSummary, SnapshotRecord,
};
use drsnap_provider::AzCliClient;
use tempfile::TempDir;
use tokio::time::Instant;

const TS: &str = "20240101120000";

const VM1: &str = "/subscriptions/S1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1";
const VM2: &str = "/subscriptions/S2/resourceGroups/rg2/providers/Microsoft.Compute/virtualMachines/vm2";
const VM3: &str = "/subscriptions/S1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm3";

struct Fixture {
    dir: TempDir,
    config: AppConfig,
}

impl Fixture {
    fn new(inventory: &[String]) -> Self {
        let dir = TempDir::new().unwrap();
        let inventory_file = dir.path().join("linux_vm-inventory.csv");
        fs::write(&inventory_file, inventory.join("\n")).unwrap();

        let config = AppConfig {
            inventory_file,
            log_dir: dir.path().join("logs"),
            registry_file: dir.path().join("snap_rid_list.txt"),
            retry: RetrySettings {
                max_attempts: 3,
                delay_secs: 0,
                retry_non_idempotent: true,
            },
            max_concurrency: Some(4),
            ..AppConfig::default()
        };
        Self { dir, config }
    }

    fn hosts(&self, hosts: &[&str]) -> PathBuf {
        let path = self.dir.path().join("snapshot_vmlist.txt");
        fs::write(&path, hosts.join("\n")).unwrap();
        path
    }

    fn params(&self, hosts: &[&str], exclude: &[&str]) -> RunParams {
        RunParams {
            host_file: self.hosts(hosts),
            chg_number: "123".to_string(),
            ttl_days: 7,
            exclude_keywords: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn orchestrator(&self, runner: &Arc<ScriptedRunner>) -> Orchestrator {
        let client = AzCliClient::new(
            CommandExecutor::new(runner.clone()),
            "az",
            self.config.retry.clone(),
        );
        Orchestrator::new(Arc::new(client), self.config.clone())
    }

    fn sink(&self) -> FileAuditSink {
        FileAuditSink::create(&self.config.log_dir, &self.config.registry_file, TS).unwrap()
    }

    fn registry(&self) -> String {
        fs::read_to_string(&self.config.registry_file).unwrap_or_default()
    }
}

fn vm_detail(rg: &str, disk: &str) -> CommandResult {
    CommandResult::ok(format!(r#"{{"resourceGroup": "{rg}", "diskId": "{disk}"}}"#))
}

fn snapshot(id: &str) -> CommandResult {
    CommandResult::ok(format!(r#"{{"id": "{id}", "provisioningState": "Succeeded"}}"#))
}

fn logged_in() -> ScriptedRunner {
    ScriptedRunner::new().on("account show", CommandResult::ok("alice@example.com"))
}

const WEB_VMS: [&str; 4] = ["web1", "web2", "web3", "web4"];

fn web_inventory() -> Vec<String> {
    WEB_VMS
        .iter()
        .map(|name| {
            format!(
                "/subscriptions/S1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/{name} {name} prod"
            )
        })
        .collect()
}

/// Fixture whose snapshot creation gets two attempts five seconds apart.
fn throttled_fixture(max_concurrency: usize) -> Fixture {
    let mut fixture = Fixture::new(&web_inventory());
    fixture.config.retry = RetrySettings {
        max_attempts: 2,
        delay_secs: 5,
        retry_non_idempotent: true,
    };
    fixture.config.max_concurrency = Some(max_concurrency);
    fixture
}

/// Every web VM's first create is throttled and its retry succeeds, except
/// `always_failing`, whose create never succeeds.
fn throttled_runner(always_failing: Option<&str>) -> Arc<ScriptedRunner> {
    let mut runner = logged_in()
        .on("account set", CommandResult::ok(""))
        .on("vm show", vm_detail("rg1", "disk"));
    for name in WEB_VMS {
        let pattern = format!("--name RH_123_{name}_");
        runner = if always_failing == Some(name) {
            runner.on(pattern, CommandResult::failed(1, "QuotaExceeded"))
        } else {
            runner.on_sequence(
                pattern,
                vec![
                    CommandResult::failed(1, "Throttled"),
                    snapshot(&format!("/subscriptions/S1/snapshots/{name}")),
                ],
            )
        };
    }
    Arc::new(runner)
}

/// Sink that records everything in files but cannot write the summary.
struct NoSummarySink(FileAuditSink);

impl AuditSink for NoSummarySink {
    fn append_log(&self, entry: &str) -> SnapResult<()> {
        self.0.append_log(entry)
    }

    fn append_snapshot_record(&self, record: &SnapshotRecord) -> SnapResult<()> {
        self.0.append_snapshot_record(record)
    }

    fn write_summary(&self, _summary: &RunSummary<'_>) -> SnapResult<()> {
        Err(SnapError::Internal("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_failed_subscription_switch_fails_only_its_group() {
    let fixture = Fixture::new(&[format!("{VM1} vm1 prod"), format!("{VM2} vm2 prod")]);
    let runner = Arc::new(
        logged_in()
            .on("account set --subscription S1", CommandResult::ok(""))
            .on(
                "account set --subscription S2",
                CommandResult::failed(1, "SubscriptionNotFound"),
            )
            .on(&format!("--ids {VM1}"), vm_detail("rg1", "disk-vm1"))
            .on("snapshot create", snapshot("/subscriptions/S1/snapshots/RH_123_vm1")),
    );
    let sink = fixture.sink();

    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1", "vm2"], &[]), TS, &sink)
        .await
        .unwrap();

    let outcome = &run.outcome;
    assert_eq!(outcome.total_vms, 2);
    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].vm_name, "vm1");
    assert_eq!(outcome.succeeded[0].snapshot_name, "RH_123_vm1_20240101120000");
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].vm_name, "vm2");
    assert_eq!(outcome.failed[0].reason, FailureReason::SetSubscription);
    assert!(outcome.is_balanced());

    // The switch to S2 is retried, but no VM of S2 is queried.
    assert_eq!(runner.call_count("account set --subscription S2"), 3);
    assert_eq!(runner.call_count(&format!("--ids {VM2}")), 0);

    let registry = fixture.registry();
    assert_eq!(registry.lines().count(), 1);
    assert!(registry.starts_with("/subscriptions/S1/snapshots/RH_123_vm1,RH_123_vm1_20240101120000,"));
    assert!(registry.trim_end().ends_with(",alice@example.com"));

    let summary = fs::read_to_string(sink.summary_path()).unwrap();
    assert!(summary.contains("- vm1: RH_123_vm1_20240101120000"));
    assert!(summary.contains("- vm2: Failed to set subscription"));

    let log = fs::read_to_string(sink.log_path()).unwrap();
    assert!(log.contains("CHG Number: 123"));
    assert!(log.contains("Failed to set subscription ID: S2"));
    assert!(log.contains("Error: SubscriptionNotFound"));
}

#[tokio::test]
async fn test_excluded_vm_is_absent_from_outcome() {
    let fixture = Fixture::new(&[
        format!("{VM1} vm1 prod"),
        format!("{VM2} vm2 DoNotSnapshot"),
    ]);
    let runner = Arc::new(
        logged_in()
            .on("account set", CommandResult::ok(""))
            .on("vm show", vm_detail("rg1", "disk-vm1"))
            .on("snapshot create", snapshot("/subscriptions/S1/snapshots/RH_123_vm1")),
    );
    let sink = fixture.sink();

    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1", "vm2"], &["DoNotSnapshot"]), TS, &sink)
        .await
        .unwrap();

    assert_eq!(run.outcome.total_vms, 1);
    assert_eq!(run.excluded, vec!["vm2".to_string()]);
    assert!(run.outcome.succeeded.iter().all(|vm| vm.vm_name != "vm2"));
    assert!(run.outcome.failed.iter().all(|vm| vm.vm_name != "vm2"));
    assert_eq!(runner.call_count("account set --subscription S2"), 0);
}

#[tokio::test]
async fn test_snapshot_without_id_is_not_registered() {
    let fixture = Fixture::new(&[format!("{VM1} vm1 prod")]);
    let runner = Arc::new(
        logged_in()
            .on("account set", CommandResult::ok(""))
            .on("vm show", vm_detail("rg1", "disk-vm1"))
            .on("snapshot create", CommandResult::ok(r#"{"name": "RH_123_vm1"}"#)),
    );
    let sink = fixture.sink();

    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1"], &[]), TS, &sink)
        .await
        .unwrap();

    assert_eq!(run.outcome.failed.len(), 1);
    assert_eq!(run.outcome.failed[0].reason, FailureReason::ExtractSnapshotId);
    assert!(fixture.registry().is_empty());
}

#[tokio::test]
async fn test_missing_hosts_and_detail_failures_keep_the_batch_going() {
    let fixture = Fixture::new(&[
        format!("{VM1} vm1 prod"),
        format!("{VM3} vm3 prod"),
        "/resourceGroups/rg9/providers/Microsoft.Compute/virtualMachines/vm9 vm9 prod".to_string(),
    ]);
    let runner = Arc::new(
        logged_in()
            .on("account set", CommandResult::ok(""))
            .on(&format!("--ids {VM3}"), CommandResult::failed(3, "ResourceNotFound"))
            .on("vm show", vm_detail("rg1", "disk-vm1"))
            .on("snapshot create", snapshot("/subscriptions/S1/snapshots/RH_123_vm1")),
    );
    let sink = fixture.sink();

    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["ghost", "vm1", "vm3", "vm9"], &[]), TS, &sink)
        .await
        .unwrap();

    let outcome = &run.outcome;
    assert_eq!(run.not_found, vec!["ghost".to_string()]);
    assert_eq!(outcome.total_vms, 3);
    assert!(outcome.is_balanced());
    assert_eq!(outcome.succeeded.len(), 1);

    let reason_of = |name: &str| {
        outcome
            .failed
            .iter()
            .find(|vm| vm.vm_name == name)
            .map(|vm| vm.reason)
    };
    assert_eq!(reason_of("vm3"), Some(FailureReason::VmDetails));
    assert_eq!(reason_of("vm9"), Some(FailureReason::MalformedResourceId));
    assert_eq!(runner.call_count("snapshot create"), 1);
}

#[tokio::test]
async fn test_single_attempt_create_when_retry_disabled() {
    let mut fixture = Fixture::new(&[format!("{VM1} vm1 prod")]);
    fixture.config.retry.retry_non_idempotent = false;
    let runner = Arc::new(
        logged_in()
            .on("account set", CommandResult::ok(""))
            .on("vm show", vm_detail("rg1", "disk-vm1"))
            .on("snapshot create", CommandResult::failed(1, "InternalServerError")),
    );
    let sink = fixture.sink();

    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1"], &[]), TS, &sink)
        .await
        .unwrap();

    assert_eq!(run.outcome.failed[0].reason, FailureReason::CreateSnapshot);
    assert_eq!(runner.call_count("snapshot create"), 1);
}

#[tokio::test]
async fn test_no_identity_aborts_before_any_snapshot() {
    let fixture = Fixture::new(&[format!("{VM1} vm1 prod")]);
    let runner = Arc::new(
        ScriptedRunner::new().on("account show", CommandResult::failed(1, "Please run 'az login'")),
    );
    let sink = fixture.sink();

    let err = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1"], &[]), TS, &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::NoIdentity(_)));
    assert_eq!(err.phase(), Some(RunPhase::Authenticating));
    assert!(err.to_string().contains("az login"));
    assert_eq!(runner.call_count("snapshot create"), 0);
    assert!(!sink.summary_path().exists());
}

#[tokio::test]
async fn test_unreadable_inventory_is_fatal() {
    let mut fixture = Fixture::new(&[]);
    fixture.config.inventory_file = fixture.dir.path().join("missing.csv");
    let runner = Arc::new(logged_in());
    let sink = fixture.sink();

    let err = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1"], &[]), TS, &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::InventoryUnreadable { .. }));
    assert_eq!(err.phase(), Some(RunPhase::ResolvingInventory));
}

#[tokio::test]
async fn test_everything_excluded_is_fatal() {
    let fixture = Fixture::new(&[format!("{VM1} vm1 DoNotSnapshot")]);
    let runner = Arc::new(logged_in());
    let sink = fixture.sink();

    let err = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1"], &["donotsnapshot"]), TS, &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::NoVmsResolved));
    assert_eq!(runner.call_count("account set"), 0);
}

#[tokio::test]
async fn test_run_reports_file_locations() {
    let fixture = Fixture::new(&[format!("{VM1} vm1 prod"), format!("{VM3} vm3 prod")]);
    let runner = Arc::new(
        logged_in()
            .on("account set", CommandResult::ok(""))
            .on("vm show", vm_detail("rg1", "disk"))
            .on("snapshot create", snapshot("/subscriptions/S1/snapshots/snap")),
    );

    let report = fixture
        .orchestrator(&runner)
        .run(&fixture.params(&["vm1", "vm3"], &[]))
        .await
        .unwrap();

    assert_eq!(report.total_vms, 2);
    assert_eq!(report.successful_snapshots, 2);
    assert_eq!(report.failed_snapshots, 0);
    assert!(report.run.summary_written);
    assert!(report.log_file.exists());
    assert!(report.summary_file.exists());
    assert_eq!(report.snap_rid_list_file, fixture.config.registry_file);
    assert_eq!(fixture.registry().lines().count(), 2);
    // Both VMs share one subscription switch.
    assert_eq!(runner.call_count("account set"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_retries_overlap_across_workers() {
    let fixture = throttled_fixture(4);
    let runner = throttled_runner(None);
    let sink = fixture.sink();

    let started = Instant::now();
    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&WEB_VMS, &[]), TS, &sink)
        .await
        .unwrap();

    // Four retry delays of five seconds each elapse side by side.
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(run.outcome.succeeded.len(), 4);
    assert!(run.outcome.failed.is_empty());
    assert_eq!(runner.call_count("snapshot create"), 8);
    assert_eq!(fixture.registry().lines().count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_worker_count_bounds_parallel_retries() {
    let fixture = throttled_fixture(2);
    let runner = throttled_runner(None);
    let sink = fixture.sink();

    let started = Instant::now();
    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&WEB_VMS, &[]), TS, &sink)
        .await
        .unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(run.outcome.succeeded.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_worker_does_not_hold_back_the_others() {
    let fixture = throttled_fixture(4);
    let runner = throttled_runner(Some("web3"));
    let sink = fixture.sink();

    let started = Instant::now();
    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&WEB_VMS, &[]), TS, &sink)
        .await
        .unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(5));
    let outcome = &run.outcome;
    assert!(outcome.is_balanced());
    assert_eq!(outcome.succeeded.len(), 3);
    assert!(outcome.succeeded.iter().all(|vm| vm.vm_name != "web3"));
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].vm_name, "web3");
    assert_eq!(outcome.failed[0].reason, FailureReason::CreateSnapshot);

    let registry = fixture.registry();
    assert_eq!(registry.lines().count(), 3);
    assert!(!registry.contains("RH_123_web3_"));
}

#[tokio::test]
async fn test_unwritable_summary_keeps_the_outcome() {
    let fixture = Fixture::new(&[format!("{VM1} vm1 prod")]);
    let runner = Arc::new(
        logged_in()
            .on("account set", CommandResult::ok(""))
            .on("vm show", vm_detail("rg1", "disk-vm1"))
            .on("snapshot create", snapshot("/subscriptions/S1/snapshots/RH_123_vm1")),
    );
    let sink = NoSummarySink(fixture.sink());

    let run = fixture
        .orchestrator(&runner)
        .execute(&fixture.params(&["vm1"], &[]), TS, &sink)
        .await
        .unwrap();

    assert!(!run.summary_written);
    assert_eq!(run.outcome.succeeded.len(), 1);
    assert_eq!(run.outcome.succeeded[0].snapshot_name, "RH_123_vm1_20240101120000");
    assert_eq!(fixture.registry().lines().count(), 1);

    let log = fs::read_to_string(sink.0.log_path()).unwrap();
    assert!(log.contains("Failed to write summary: Internal error: disk full"));
}

#[test]
fn test_plan_groups_without_provider_calls() {
    let fixture = Fixture::new(&[
        format!("{VM1} vm1 prod"),
        format!("{VM2} vm2 prod"),
        format!("{VM3} vm3 prod"),
    ]);
    let runner = Arc::new(ScriptedRunner::new());
    let params = fixture.params(&["vm2", "vm1", "vm3", "ghost"], &[]);

    let plan = fixture
        .orchestrator(&runner)
        .plan(&params.host_file, &params.exclude_keywords)
        .unwrap();

    let subscriptions: Vec<_> = plan.groups.iter().map(|g| g.subscription_id.as_str()).collect();
    assert_eq!(subscriptions, ["S2", "S1"]);
    assert_eq!(plan.total_vms(), 3);
    assert_eq!(plan.not_found, vec!["ghost".to_string()]);
    assert!(runner.calls().is_empty());
}
