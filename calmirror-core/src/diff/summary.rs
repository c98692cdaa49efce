use serde::{Deserialize, Serialize};

use crate::diff::{ChangeKind, EventChange};

/// Everything a merge did, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub changes: Vec<EventChange>,
    /// Some changed event in the batch was created by the syncing user.
    pub self_authored: bool,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn has_semantic_change(&self) -> bool {
        self.changes.iter().any(EventChange::has_semantic_change)
    }

    /// Announce only real changes the user didn't make themselves, and only if
    /// there is something to say.
    pub fn should_notify(&self, composed: &str) -> bool {
        self.has_semantic_change() && !self.self_authored && !composed.trim().is_empty()
    }

    /// Number of semantically meaningful changes.
    pub fn meaningful_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| c.has_semantic_change())
            .count()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}
