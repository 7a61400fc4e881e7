use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ConflictKind, GroupStatus, Id};

/// Conflicts with the same resource shape and the exact same participants, resolved as one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictGroup {
    /// Derived from `key`, stable across synchronisation passes
    pub id: Id,
    pub key: String,
    pub conflict_kind: ConflictKind,
    pub participants: Vec<Id>,
    pub conflict_ids: Vec<Id>,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tally reported after a group-wide action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTally {
    pub conflicts_in_group: usize,
    pub resolved: usize,
    pub open: usize,
}
