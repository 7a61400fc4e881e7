use serde::{Deserialize, Serialize};

use crate::model::{ConflictDocument, ConflictGroup, ConflictKind, ConflictStatus, GroupStatus, Id};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConflictKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConflictStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot_id: Option<Id>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<Id>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Id>,
}

impl ConflictFilter {
    pub fn matches(&self, conflict: &ConflictDocument) -> bool {
        use crate::model::ConflictTrigger;

        if self.kind.is_some_and(|k| k != conflict.kind()) {
            return false;
        }
        if self.status.is_some_and(|s| s != conflict.status) {
            return false;
        }
        if let Some(pot_id) = &self.pot_id {
            if !matches!(&conflict.trigger, ConflictTrigger::Pot { triggering_pot } if triggering_pot == pot_id) {
                return false;
            }
        }
        if let Some(slot_id) = &self.slot_id {
            if !matches!(&conflict.trigger, ConflictTrigger::Slot { triggering_slot } if triggering_slot == slot_id) {
                return false;
            }
        }
        if let Some(request_id) = &self.request_id {
            if !conflict.participants.contains(request_id) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConflictKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GroupStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Id>,
}

impl GroupFilter {
    pub fn matches(&self, group: &ConflictGroup) -> bool {
        self.kind.map_or(true, |k| k == group.conflict_kind)
            && self.status.map_or(true, |s| s == group.status)
            && self
                .request_id
                .as_ref()
                .map_or(true, |id| group.participants.contains(id))
    }
}
