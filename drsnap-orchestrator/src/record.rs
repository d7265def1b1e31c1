//! VM identity records, resource-id parsing and snapshot naming.

use std::fmt::{self, Display, Formatter};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Resource-id segment that must precede the subscription id.
const SUBSCRIPTIONS_SEGMENT: &str = "subscriptions";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed resource ID '{resource_id}': {reason}")]
pub struct ResourceIdError {
    pub resource_id: String,
    pub reason: &'static str,
}

/// Extract the subscription id from a resource id of the form
/// `/subscriptions/<id>/...`.
pub fn extract_subscription_id(resource_id: &str) -> Result<&str, ResourceIdError> {
    let malformed = |reason| ResourceIdError {
        resource_id: resource_id.to_string(),
        reason,
    };

    let mut segments = resource_id.split('/');
    if segments.next() != Some("") {
        return Err(malformed("must start with '/'"));
    }
    match segments.next() {
        Some(segment) if segment.eq_ignore_ascii_case(SUBSCRIPTIONS_SEGMENT) => {}
        _ => return Err(malformed("missing 'subscriptions' segment")),
    }
    match segments.next() {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(malformed("empty subscription id")),
    }
}

/// A VM resolved from the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmRecord {
    pub resource_id: String,
    pub name: String,
}

impl VmRecord {
    pub fn new(resource_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            name: name.into(),
        }
    }

    /// Build a record from an inventory line whose first two
    /// whitespace-separated tokens are the resource id and the VM name.
    pub fn from_inventory_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let resource_id = tokens.next()?;
        let name = tokens.next()?;
        Some(Self::new(resource_id, name))
    }

    pub fn subscription_id(&self) -> Result<&str, ResourceIdError> {
        extract_subscription_id(&self.resource_id)
    }
}

/// One line of the snapshot registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub snapshot_name: String,
    pub expiration_date: NaiveDate,
    pub owner_user_id: String,
}

impl SnapshotRecord {
    /// `snapshotId,snapshotName,expirationDate,ownerUserId`
    pub fn to_registry_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.snapshot_id,
            self.snapshot_name,
            self.expiration_date.format("%Y-%m-%d"),
            self.owner_user_id
        )
    }
}

/// `{prefix}_{chg}_{vm}_{timestamp}`, unique per VM within a run and traceable
/// to the change request.
pub fn snapshot_name(prefix: &str, chg_number: &str, vm_name: &str, timestamp: &str) -> String {
    format!("{}_{}_{}_{}", prefix, chg_number, vm_name, timestamp)
}

/// Why a VM ended up without a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MalformedResourceId,
    SetSubscription,
    VmDetails,
    CreateSnapshot,
    ExtractSnapshotId,
    RecordSnapshot,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedResourceId => "Malformed resource ID",
            Self::SetSubscription => "Failed to set subscription",
            Self::VmDetails => "Failed to get VM details",
            Self::CreateSnapshot => "Failed to create snapshot",
            Self::ExtractSnapshotId => "Failed to extract snapshot ID",
            Self::RecordSnapshot => "Failed to record snapshot ID",
        }
    }
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FailureReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
