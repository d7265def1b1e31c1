//! Host list and inventory resolution.
//!
//! The inventory is a line-oriented text file; a hostname resolves to the
//! first line containing it. Hosts that are missing or excluded are reported
//! as diagnostics rather than errors. Both files are decoded lossily, so a
//! stray non-UTF-8 byte only affects the line it sits on.

use std::fs;
use std::path::Path;

use drsnap_core::error::{Result, SnapError};
use tracing::{debug, warn};

use crate::record::VmRecord;

/// Lookup of a hostname in the inventory.
pub trait InventoryLookup {
    /// First inventory line containing `hostname` (case-sensitive substring).
    fn lookup(&self, hostname: &str) -> Option<&str>;
}

/// Inventory held in memory, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct FileInventory {
    lines: Vec<String>,
}

impl FileInventory {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| SnapError::filesystem(e, path.to_string_lossy(), "read inventory"))?;
        Ok(Self::from_lines(String::from_utf8_lossy(&bytes).lines()))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|l| l.as_ref().trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }
}

impl InventoryLookup for FileInventory {
    fn lookup(&self, hostname: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.contains(hostname))
            .map(String::as_str)
    }
}

/// Hostnames to snapshot, one per line. Blank lines are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostList {
    hostnames: Vec<String>,
}

impl HostList {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| SnapError::filesystem(e, path.to_string_lossy(), "read host list"))?;
        Ok(Self::from_lines(String::from_utf8_lossy(&bytes).lines()))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hostnames: lines
                .into_iter()
                .map(|l| l.as_ref().trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }
}

/// Result of resolving a host list against the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// VMs to snapshot, in host-list order
    pub records: Vec<VmRecord>,
    /// Hostnames whose inventory line matched an exclusion keyword
    pub excluded: Vec<String>,
    /// Hostnames with no inventory line
    pub not_found: Vec<String>,
    /// Hostnames whose inventory line lacks a resource id and a VM name
    pub unparseable: Vec<String>,
}

/// Resolve `hostnames` against `inventory`, dropping lines that contain any
/// of `exclude_keywords` (case-insensitive). Keywords are matched verbatim,
/// surrounding whitespace included; whitespace-only keywords are ignored.
pub fn resolve(
    hostnames: &[String],
    inventory: &dyn InventoryLookup,
    exclude_keywords: &[String],
) -> Resolution {
    let keywords: Vec<String> = exclude_keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .map(|k| k.to_lowercase())
        .collect();

    let mut resolution = Resolution::default();

    for hostname in hostnames {
        let Some(line) = inventory.lookup(hostname) else {
            warn!("Information not found for hostname '{}'", hostname);
            resolution.not_found.push(hostname.clone());
            continue;
        };

        let lowered = line.to_lowercase();
        if keywords.iter().any(|k| lowered.contains(k.as_str())) {
            debug!(hostname, "Excluded by keyword");
            resolution.excluded.push(hostname.clone());
            continue;
        }

        match VmRecord::from_inventory_line(line) {
            Some(record) => resolution.records.push(record),
            None => {
                warn!(hostname, line, "Inventory line has no resource id and VM name");
                resolution.unparseable.push(hostname.clone());
            }
        }
    }

    if !resolution.excluded.is_empty() {
        warn!(
            "Excluded VMs based on keywords: {}",
            resolution.excluded.join(", ")
        );
    }

    resolution
}
