//! Request and response shapes for provider commands.

use serde::Deserialize;

/// Resource group and OS disk of a VM, fetched right before its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmDetail {
    pub resource_group: String,
    pub disk_id: String,
}

/// Raw `az vm show` projection; `diskId` is null for VMs without a managed OS disk.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VmDetailResponse {
    pub resource_group: Option<String>,
    pub disk_id: Option<String>,
}

/// Everything needed to create one snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub name: String,
    pub resource_group: String,
    pub source_disk_id: String,
    pub tags: Vec<(String, String)>,
}

/// Parsed `az snapshot create` response.
#[derive(Debug, Clone)]
pub struct SnapshotResponse {
    /// Resource id of the new snapshot; `None` when the provider omitted it
    pub id: Option<String>,
    /// Full response document, kept for the audit log
    pub document: serde_json::Value,
}

impl SnapshotResponse {
    pub fn from_document(document: serde_json::Value) -> Self {
        let id = document
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Self { id, document }
    }
}
