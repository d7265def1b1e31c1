use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const VM1: &str =
    "/subscriptions/S1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/web01";
const VM2: &str =
    "/subscriptions/S2/resourceGroups/rg2/providers/Microsoft.Compute/virtualMachines/db01";

/// Temporary working directory with an inventory, a host list and a config
/// pointing at a provider binary that does not exist.
struct CliTestFixture {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl CliTestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(
            root.join("inventory.csv"),
            format!("{VM1} web01 prod\n{VM2} db01 DoNotSnapshot\n"),
        )
        .unwrap();
        fs::write(root.join("hosts.txt"), "web01\ndb01\nghost\n").unwrap();

        let config_path = root.join("drsnap.yaml");
        fs::write(
            &config_path,
            format!(
                "inventory_file: '{}'\nlog_dir: '{}'\nregistry_file: '{}'\naz_binary: '{}'\nretry:\n  max_attempts: 1\n  delay_secs: 0\n",
                root.join("inventory.csv").display(),
                root.join("logs").display(),
                root.join("snap_rid_list.txt").display(),
                root.join("no-such-az").display(),
            ),
        )
        .unwrap();

        Self {
            temp_dir,
            config_path,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("drsnap").unwrap();
        cmd.current_dir(self.temp_dir.path())
            .env("DRSNAP_LOG_LEVEL", "error")
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }

    fn hosts(&self) -> PathBuf {
        self.temp_dir.path().join("hosts.txt")
    }
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("drsnap")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("whoami"));
}

#[test]
fn test_plan_groups_by_subscription() {
    let fixture = CliTestFixture::new();

    fixture
        .cmd()
        .arg("plan")
        .arg("--hosts")
        .arg(fixture.hosts())
        .assert()
        .success()
        .stdout(predicate::str::contains("Subscription S1:"))
        .stdout(predicate::str::contains("Subscription S2:"))
        .stdout(predicate::str::contains("Not found in inventory: ghost"));
}

#[test]
fn test_plan_json_honours_exclusions() {
    let fixture = CliTestFixture::new();

    let output = fixture
        .cmd()
        .args(["plan", "--json", "--exclude", "donotsnapshot"])
        .arg("--hosts")
        .arg(fixture.hosts())
        .output()
        .unwrap();

    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["groups"].as_array().unwrap().len(), 1);
    assert_eq!(plan["groups"][0]["subscription_id"], "S1");
    assert_eq!(plan["excluded"][0], "db01");
}

#[test]
fn test_create_rejects_invalid_change_number() {
    let fixture = CliTestFixture::new();

    fixture
        .cmd()
        .args(["create", "--chg", "CHG 1"])
        .arg("--hosts")
        .arg(fixture.hosts())
        .assert()
        .failure()
        .stderr(predicate::str::contains("change number"));

    assert!(!fixture.temp_dir.path().join("logs").exists());
}

#[test]
fn test_create_without_identity_fails_after_opening_log() {
    let fixture = CliTestFixture::new();

    fixture
        .cmd()
        .args(["create", "--chg", "CHG1"])
        .arg("--hosts")
        .arg(fixture.hosts())
        .assert()
        .failure()
        .stderr(predicate::str::contains("az login"));

    let logs: Vec<_> = fs::read_dir(fixture.temp_dir.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("snapshot_creation_log_"));
    assert!(!fixture.temp_dir.path().join("snap_rid_list.txt").exists());
}

#[test]
fn test_whoami_without_provider_cli_fails() {
    let fixture = CliTestFixture::new();

    fixture
        .cmd()
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("az login"));
}
