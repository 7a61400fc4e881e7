use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AssignmentStatus, ConflictKind, Id, RequestStatus, TrafficMode};

/// A capacity request ("Anfrage") with the slots it has been matched to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Id,
    /// Requesting operator ("EVU")
    pub operator: String,
    pub train_number: Option<String>,
    pub traffic_mode: TrafficMode,
    pub traffic_days: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    /// Fee ("Entgelt") computed by the pricing collaborator
    pub fee: f64,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub status: RequestStatus,
    pub updated_at: DateTime<Utc>,
}

/// One slot a request has been matched to ("ZugewieseneSlots" entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub slot_id: Id,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pot_conflict_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_conflict_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pot_status: Option<AssignmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_slot_status: Option<AssignmentStatus>,
}

impl Assignment {
    pub fn new(slot_id: Id) -> Self {
        Self {
            slot_id,
            status: AssignmentStatus::Unchecked,
            pot_conflict_id: None,
            slot_conflict_id: None,
            last_pot_status: None,
            last_slot_status: None,
        }
    }

    /// Write a status and keep conflict reference and terminal snapshot in step with it
    pub fn set_status(&mut self, status: AssignmentStatus, conflict_id: Option<&Id>) {
        self.status = status;
        match status {
            AssignmentStatus::Unchecked => {}
            AssignmentStatus::Pot(phase) => {
                if let Some(id) = conflict_id {
                    self.pot_conflict_id = Some(id.clone());
                }
                if phase.is_terminal() {
                    self.last_pot_status = Some(status);
                }
            }
            AssignmentStatus::Slot(phase) => {
                if let Some(id) = conflict_id {
                    self.slot_conflict_id = Some(id.clone());
                }
                if phase.is_terminal() {
                    self.last_slot_status = Some(status);
                }
            }
        }
    }

    pub fn clear_snapshot(&mut self, kind: ConflictKind) {
        match kind {
            ConflictKind::Pot => self.last_pot_status = None,
            ConflictKind::Slot => self.last_slot_status = None,
        }
    }

    /// Already decided or fighting on slot level, so pot handling must not regress it
    pub fn is_past_pot_phase(&self) -> bool {
        self.status.is_slot_level() || self.last_slot_status.is_some()
    }
}

impl Request {
    pub fn assignment(&self, slot_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.slot_id == slot_id)
    }

    /// Recompute the aggregate status from the assignment statuses
    pub fn recompute_status(&mut self) {
        self.status = aggregate_status(self.assignments.iter().map(|a| a.status));
        self.updated_at = Utc::now();
    }
}

fn aggregate_status<I>(statuses: I) -> RequestStatus
where
    I: IntoIterator<Item = AssignmentStatus>,
{
    let statuses: Vec<AssignmentStatus> = statuses.into_iter().collect();
    if statuses.is_empty() || statuses.contains(&AssignmentStatus::Unchecked) {
        return RequestStatus::InReview;
    }
    if statuses.iter().any(|s| s.is_waiting()) {
        return RequestStatus::InConflictResolution;
    }
    let confirmed = statuses.iter().filter(|s| s.is_confirmed()).count();
    match confirmed {
        0 => RequestStatus::FullyRejected,
        n if n == statuses.len() => RequestStatus::FullyConfirmed,
        _ => RequestStatus::PartiallyConfirmed,
    }
}
