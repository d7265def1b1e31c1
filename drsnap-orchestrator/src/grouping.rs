//! Partition resolved VMs by subscription.

use indexmap::IndexMap;

use crate::record::{ResourceIdError, VmRecord};

/// VMs keyed by subscription id, in first-encounter order.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionGroups {
    pub groups: IndexMap<String, Vec<VmRecord>>,
    /// Records whose resource id carries no subscription
    pub malformed: Vec<(VmRecord, ResourceIdError)>,
}

impl SubscriptionGroups {
    /// Number of records across all groups, malformed ones included.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum::<usize>() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group records by the subscription embedded in their resource id,
/// preserving encounter order within each group.
pub fn group_by_subscription(records: Vec<VmRecord>) -> SubscriptionGroups {
    let mut grouped = SubscriptionGroups::default();

    for record in records {
        match record.subscription_id() {
            Ok(subscription_id) => {
                let key = subscription_id.to_string();
                grouped.groups.entry(key).or_default().push(record);
            }
            Err(e) => grouped.malformed.push((record, e)),
        }
    }

    grouped
}
