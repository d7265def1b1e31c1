//! Configuration model for a drsnap installation.
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration that matches the historical file layout.

use std::path::PathBuf;
use std::time::Duration;

use drsnap_core::error::{Result, SnapError};
use drsnap_core::{optimal_concurrency, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Root configuration structure, usually read from `drsnap.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inventory file mapping hostnames to resource lines
    #[serde(default = "default_inventory_file")]
    pub inventory_file: PathBuf,

    /// Directory receiving per-run logs and summaries
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Append-only registry of created snapshots, shared across runs
    #[serde(default = "default_registry_file")]
    pub registry_file: PathBuf,

    /// TTL applied when a run does not specify one
    #[serde(default = "default_ttl_days")]
    pub default_ttl_days: u32,

    /// Provider CLI executable
    #[serde(default = "default_az_binary")]
    pub az_binary: String,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub snapshot: SnapshotSettings,

    /// Upper bound on concurrent snapshot workers within one subscription.
    /// Unset means CPU-adaptive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Where this configuration was loaded from, if anywhere
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Retry behaviour for provider commands
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts per command, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Whether snapshot creation is retried like read-only commands.
    /// A lost response after a successful create can then produce a duplicate.
    #[serde(default = "default_true")]
    pub retry_non_idempotent: bool,
}

/// Naming and tagging of created snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotSettings {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Value of the `drtier` tag
    #[serde(default = "default_dr_tier")]
    pub dr_tier: String,
}

fn default_inventory_file() -> PathBuf {
    PathBuf::from("linux_vm-inventory.csv")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_registry_file() -> PathBuf {
    PathBuf::from("snap_rid_list.txt")
}

fn default_ttl_days() -> u32 {
    7
}

fn default_az_binary() -> String {
    "az".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_name_prefix() -> String {
    "RH".to_string()
}

fn default_dr_tier() -> String {
    "NR".to_string()
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
            retry_non_idempotent: true,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }

    /// Policy for commands that must not be blindly repeated.
    pub fn non_idempotent_policy(&self) -> RetryPolicy {
        if self.retry_non_idempotent {
            self.policy()
        } else {
            RetryPolicy::single_attempt()
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            dr_tier: default_dr_tier(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inventory_file: default_inventory_file(),
            log_dir: default_log_dir(),
            registry_file: default_registry_file(),
            default_ttl_days: default_ttl_days(),
            az_binary: default_az_binary(),
            retry: RetrySettings::default(),
            snapshot: SnapshotSettings::default(),
            max_concurrency: None,
            source_path: None,
        }
    }
}

impl AppConfig {
    /// Effective worker limit for one subscription group.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(optimal_concurrency)
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(SnapError::validation(
                "retry.max_attempts must be at least 1",
                Some("retry.max_attempts"),
            ));
        }
        if self.default_ttl_days == 0 {
            return Err(SnapError::validation(
                "default_ttl_days must be at least 1",
                Some("default_ttl_days"),
            ));
        }
        if self.max_concurrency == Some(0) {
            return Err(SnapError::validation(
                "max_concurrency must be at least 1 when set",
                Some("max_concurrency"),
            ));
        }
        if self.snapshot.name_prefix.trim().is_empty() {
            return Err(SnapError::validation(
                "snapshot.name_prefix must not be empty",
                Some("snapshot.name_prefix"),
            ));
        }
        if self.az_binary.trim().is_empty() {
            return Err(SnapError::validation(
                "az_binary must not be empty",
                Some("az_binary"),
            ));
        }
        Ok(())
    }
}
