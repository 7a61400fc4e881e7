use serde::Serialize;
use std::collections::HashMap;

use crate::model::{ConflictDocument, Id};

/// What one detection pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    pub resources_checked: usize,
    pub created: usize,
    pub reset: usize,
    pub unchanged: usize,
    pub auto_closed: usize,
    /// Resolved slot conflicts whose recorded outcome was written back after a pot reset
    pub restored: usize,
    /// Requests confirmed without ever needing a conflict
    pub confirmed_directly: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionOutcome {
    pub summary: DetectionSummary,
    /// Conflict documents created, reset or closed by this pass
    pub conflicts: Vec<ConflictDocument>,
}

/// Most recent conflict per triggering resource
pub(crate) fn latest_by_resource(conflicts: Vec<ConflictDocument>) -> HashMap<Id, ConflictDocument> {
    let mut latest: HashMap<Id, ConflictDocument> = HashMap::new();
    for conflict in conflicts {
        let resource = conflict.trigger.resource_id().clone();
        match latest.get(&resource) {
            Some(current) if current.created_at >= conflict.created_at => {}
            _ => {
                latest.insert(resource, conflict);
            }
        }
    }
    latest
}
