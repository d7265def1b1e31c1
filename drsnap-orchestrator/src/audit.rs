//! Audit trail of a run: timestamped log, snapshot registry and summary.
//!
//! Appends happen from concurrent workers. Each call performs a single
//! `write_all` of a complete entry under a lock and flushes before returning,
//! so entries never interleave and survive a crash of the process.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use drsnap_core::error::{Result, SnapError};
use tracing::debug;

use crate::outcome::RunOutcome;
use crate::record::SnapshotRecord;

/// Format of the timestamp prefixed to every log entry.
const LOG_ENTRY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Data rendered into the summary file.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    pub chg_number: &'a str,
    pub ttl_days: u32,
    pub outcome: &'a RunOutcome,
    pub excluded: &'a [String],
    pub not_found: &'a [String],
}

/// Destination for everything a run must leave behind.
pub trait AuditSink: Send + Sync {
    fn append_log(&self, entry: &str) -> Result<()>;

    fn append_snapshot_record(&self, record: &SnapshotRecord) -> Result<()>;

    fn write_summary(&self, summary: &RunSummary<'_>) -> Result<()>;
}

pub fn render_summary(summary: &RunSummary<'_>) -> String {
    let outcome = summary.outcome;
    let mut lines = vec![
        "Self-Destruct Snapshot Creation Summary".to_string(),
        "=======================================".to_string(),
        String::new(),
        format!("CHG Number: {}", summary.chg_number),
        format!("Total VMs processed: {}", outcome.total_vms),
        format!("Successful snapshots: {}", outcome.succeeded.len()),
        format!("Failed snapshots: {}", outcome.failed.len()),
        format!("Time-to-Live: {} days", summary.ttl_days),
        String::new(),
        "Successful snapshots:".to_string(),
    ];
    lines.extend(
        outcome
            .succeeded
            .iter()
            .map(|vm| format!("- {}: {}", vm.vm_name, vm.snapshot_name)),
    );
    lines.push(String::new());
    lines.push("Failed snapshots:".to_string());
    lines.extend(
        outcome
            .failed
            .iter()
            .map(|vm| format!("- {}: {}", vm.vm_name, vm.reason)),
    );

    for (title, hosts) in [
        ("Excluded by keyword:", summary.excluded),
        ("Not found in inventory:", summary.not_found),
    ] {
        if !hosts.is_empty() {
            lines.push(String::new());
            lines.push(title.to_string());
            lines.extend(hosts.iter().map(|host| format!("- {}", host)));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// File-backed sink.
///
/// Layout: `<log_dir>/snapshot_creation_log_<ts>.txt`,
/// `<log_dir>/snapshot_summary_<ts>.txt` and the shared registry file, which
/// accumulates across runs.
#[derive(Debug)]
pub struct FileAuditSink {
    log_path: PathBuf,
    summary_path: PathBuf,
    registry_path: PathBuf,
    log: Mutex<File>,
    registry_lock: Mutex<()>,
}

impl FileAuditSink {
    /// Create the log directory and open the run log.
    pub fn create(log_dir: &Path, registry_file: &Path, timestamp: &str) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .map_err(|e| SnapError::filesystem(e, log_dir.to_string_lossy(), "create log directory"))?;

        if let Some(parent) = registry_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SnapError::filesystem(e, parent.to_string_lossy(), "create registry directory")
            })?;
        }

        let log_path = log_dir.join(format!("snapshot_creation_log_{}.txt", timestamp));
        let summary_path = log_dir.join(format!("snapshot_summary_{}.txt", timestamp));
        let log = open_append(&log_path)?;

        debug!(log = %log_path.display(), "Opened run log");
        Ok(Self {
            log_path,
            summary_path,
            registry_path: registry_file.to_path_buf(),
            log: Mutex::new(log),
            registry_lock: Mutex::new(()),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SnapError::filesystem(e, path.to_string_lossy(), "open for append"))
}

fn poisoned(what: &str) -> SnapError {
    SnapError::Internal(format!("{} lock poisoned", what))
}

impl AuditSink for FileAuditSink {
    fn append_log(&self, entry: &str) -> Result<()> {
        let line = format!("{}: {}\n", Local::now().format(LOG_ENTRY_TIME_FORMAT), entry);
        let mut file = self.log.lock().map_err(|_| poisoned("run log"))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| SnapError::filesystem(e, self.log_path.to_string_lossy(), "append log"))
    }

    fn append_snapshot_record(&self, record: &SnapshotRecord) -> Result<()> {
        let line = format!("{}\n", record.to_registry_line());
        let _guard = self.registry_lock.lock().map_err(|_| poisoned("registry"))?;
        let mut file = open_append(&self.registry_path)?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| {
                SnapError::filesystem(e, self.registry_path.to_string_lossy(), "append registry")
            })
    }

    fn write_summary(&self, summary: &RunSummary<'_>) -> Result<()> {
        fs::write(&self.summary_path, render_summary(summary)).map_err(|e| {
            SnapError::filesystem(e, self.summary_path.to_string_lossy(), "write summary")
        })
    }
}

/// In-memory sink capturing everything a run writes.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    log: Mutex<Vec<String>>,
    records: Mutex<Vec<SnapshotRecord>>,
    summary: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn records(&self) -> Vec<SnapshotRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn summary(&self) -> Option<String> {
        self.summary.lock().ok().and_then(|s| s.clone())
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn append_log(&self, entry: &str) -> Result<()> {
        self.log
            .lock()
            .map_err(|_| poisoned("memory log"))?
            .push(entry.to_string());
        Ok(())
    }

    fn append_snapshot_record(&self, record: &SnapshotRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| poisoned("memory registry"))?
            .push(record.clone());
        Ok(())
    }

    fn write_summary(&self, summary: &RunSummary<'_>) -> Result<()> {
        *self.summary.lock().map_err(|_| poisoned("memory summary"))? =
            Some(render_summary(summary));
        Ok(())
    }
}
