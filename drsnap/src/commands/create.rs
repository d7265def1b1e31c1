// Snapshot run over a host list

use std::path::PathBuf;

use anyhow::{bail, Result};
use drsnap_config::AppConfig;
use drsnap_core::{snap_println, snap_progress, snap_success, snap_warning};
use drsnap_orchestrator::{Orchestrator, RunParams, RunReport};
use tracing::info;

use super::{print_json, provider};

pub async fn handle_create(
    config: AppConfig,
    hosts: PathBuf,
    chg: String,
    ttl: Option<u32>,
    exclude: Vec<String>,
    json: bool,
) -> Result<()> {
    let params = RunParams {
        host_file: hosts,
        chg_number: chg,
        ttl_days: ttl.unwrap_or(config.default_ttl_days),
        exclude_keywords: exclude,
    };
    params.validate()?;

    if !json {
        snap_progress!(
            "Creating snapshots for {} (CHG {}, TTL {} days)",
            params.host_file.display(),
            params.chg_number,
            params.ttl_days
        );
    }

    let orchestrator = Orchestrator::new(provider(&config), config);
    let report = orchestrator.run(&params).await?;
    info!(
        total = report.total_vms,
        succeeded = report.successful_snapshots,
        failed = report.failed_snapshots,
        "Snapshot run finished"
    );

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if report.failed_snapshots > 0 {
        bail!(
            "{} of {} snapshots failed; see {}",
            report.failed_snapshots,
            report.total_vms,
            report.log_file.display()
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let run = &report.run;

    if report.failed_snapshots == 0 {
        snap_success!("All {} snapshots created", report.successful_snapshots);
    } else {
        snap_warning!(
            "{} of {} snapshots failed",
            report.failed_snapshots,
            report.total_vms
        );
    }

    snap_println!("Total VMs processed: {}", report.total_vms);
    snap_println!("Successful snapshots: {}", report.successful_snapshots);
    snap_println!("Failed snapshots: {}", report.failed_snapshots);
    for vm in &run.outcome.succeeded {
        snap_println!("  ✓ {}: {}", vm.vm_name, vm.snapshot_name);
    }
    for vm in &run.outcome.failed {
        snap_println!("  ✗ {}: {}", vm.vm_name, vm.reason);
    }
    if !run.excluded.is_empty() {
        snap_println!("Excluded: {}", run.excluded.join(", "));
    }
    if !run.not_found.is_empty() {
        snap_println!("Not found in inventory: {}", run.not_found.join(", "));
    }
    snap_println!();
    snap_println!("Log file: {}", report.log_file.display());
    if run.summary_written {
        snap_println!("Summary file: {}", report.summary_file.display());
    } else {
        snap_warning!("Summary file could not be written: {}", report.summary_file.display());
    }
    snap_println!("Snapshot registry: {}", report.snap_rid_list_file.display());
}
