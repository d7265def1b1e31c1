// Dry run: resolve and group without contacting the provider

use std::path::Path;

use anyhow::Result;
use drsnap_config::AppConfig;
use drsnap_core::{snap_info, snap_println, snap_warning};
use drsnap_orchestrator::Orchestrator;

use super::{print_json, provider};

pub fn handle_plan(config: AppConfig, hosts: &Path, exclude: &[String], json: bool) -> Result<()> {
    let orchestrator = Orchestrator::new(provider(&config), config);
    let plan = orchestrator.plan(hosts, exclude)?;

    if json {
        return print_json(&plan);
    }

    if plan.total_vms() == 0 {
        snap_warning!("No VMs would be snapshotted");
    } else {
        snap_info!(
            "{} VMs in {} subscriptions would be snapshotted",
            plan.total_vms(),
            plan.groups.len()
        );
    }

    for group in &plan.groups {
        snap_println!("Subscription {}:", group.subscription_id);
        for vm in &group.vms {
            snap_println!("  - {} ({})", vm.name, vm.resource_id);
        }
    }
    if !plan.malformed.is_empty() {
        snap_println!("Malformed resource IDs:");
        for vm in &plan.malformed {
            snap_println!("  - {} ({})", vm.name, vm.resource_id);
        }
    }
    if !plan.excluded.is_empty() {
        snap_println!("Excluded: {}", plan.excluded.join(", "));
    }
    if !plan.not_found.is_empty() {
        snap_println!("Not found in inventory: {}", plan.not_found.join(", "));
    }
    Ok(())
}
