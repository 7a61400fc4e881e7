//! Which assignments a conflict governs, and the setters that stamp them.
//!
//! A pot conflict governs every assignment of a request that points at one of the
//! pot's parent slots; a slot conflict governs the single assignment on that slot.
//! All status writes of detectors and resolution phases go through `ConflictScope`.

use std::collections::HashSet;

use crate::model::{
    Assignment, AssignmentStatus, CapacityPot, ConflictKind, Id, PhaseStatus, Request, Slot,
};
use crate::store::RequestBatch;

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictScope {
    pub kind: ConflictKind,
    pub resource_id: Id,
    pub capacity: usize,
    /// Market-share quota, pot level only
    pub quota: Option<usize>,
    slot_ids: HashSet<Id>,
}

impl ConflictScope {
    pub fn for_pot(pot: &CapacityPot) -> Self {
        Self {
            kind: ConflictKind::Pot,
            resource_id: pot.id.clone(),
            capacity: pot.max_capacity,
            quota: Some(pot.market_share_quota()),
            slot_ids: pot.slot_ids.iter().cloned().collect(),
        }
    }

    pub fn for_slot(slot: &Slot) -> Self {
        Self {
            kind: ConflictKind::Slot,
            resource_id: slot.id.clone(),
            capacity: 1,
            quota: None,
            slot_ids: HashSet::from([slot.id.clone()]),
        }
    }

    pub fn covers(&self, assignment: &Assignment) -> bool {
        self.slot_ids.contains(&assignment.slot_id)
    }

    pub fn assignments<'a>(&'a self, request: &'a Request) -> impl Iterator<Item = &'a Assignment> + 'a {
        request.assignments.iter().filter(move |a| self.covers(a))
    }

    pub fn touches(&self, request: &Request) -> bool {
        self.assignments(request).next().is_some()
    }

    /// Status of the governed assignment; for pots the first one in request order
    pub fn status_of(&self, request: &Request) -> Option<AssignmentStatus> {
        self.assignments(request).next().map(|a| a.status)
    }

    /// Phase at this scope's level, `None` if the request is at another level
    pub fn phase_of(&self, request: &Request) -> Option<PhaseStatus> {
        self.status_of(request).and_then(|s| s.phase_at(self.kind))
    }

    /// Counts against pot capacity: some governed assignment not rejected
    pub fn is_pot_active(&self, request: &Request) -> bool {
        self.assignments(request).any(|a| !a.status.is_rejected())
    }

    /// Write `phase` at this level to every governed assignment of the request
    pub fn stamp(&self, request: &mut Request, phase: PhaseStatus, conflict_id: Option<&Id>) -> usize {
        self.stamp_where(request, phase, conflict_id, |_| true)
    }

    pub fn stamp_where<F>(
        &self,
        request: &mut Request,
        phase: PhaseStatus,
        conflict_id: Option<&Id>,
        mut filter: F,
    ) -> usize
    where
        F: FnMut(&Assignment) -> bool,
    {
        let status = AssignmentStatus::at(self.kind, phase);
        let mut stamped = 0;
        for assignment in request.assignments.iter_mut() {
            if self.slot_ids.contains(&assignment.slot_id) && filter(assignment) {
                assignment.set_status(status, conflict_id);
                stamped += 1;
            }
        }
        stamped
    }

    pub fn clear_snapshot(&self, request: &mut Request) {
        for assignment in request.assignments.iter_mut() {
            if self.slot_ids.contains(&assignment.slot_id) {
                assignment.clear_snapshot(self.kind);
            }
        }
    }

    /// Stamp every listed request present in the batch
    pub fn stamp_all(
        &self,
        batch: &mut RequestBatch,
        request_ids: &[Id],
        phase: PhaseStatus,
        conflict_id: Option<&Id>,
    ) {
        for id in request_ids {
            match batch.get_mut(id) {
                Some(request) => {
                    self.stamp(request, phase, conflict_id);
                }
                None => log::warn!(
                    "Request {} not loaded, cannot stamp {}",
                    id,
                    AssignmentStatus::at(self.kind, phase)
                ),
            }
        }
    }

    /// Back to `wartet_konflikt_*` with a cleared snapshot, as on conflict creation or reset
    pub fn restart(&self, batch: &mut RequestBatch, request_ids: &[Id], conflict_id: &Id) {
        for id in request_ids {
            if let Some(request) = batch.get_mut(id) {
                self.clear_snapshot(request);
                self.stamp(request, PhaseStatus::AwaitingConflict, Some(conflict_id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DepartureTime, RequestStatus, SlotStructure, TrafficMode};
    use chrono::{NaiveDate, Utc};

    fn request(slots: &[&str]) -> Request {
        Request {
            id: "r".to_string(),
            operator: "EVU".to_string(),
            train_number: None,
            traffic_mode: TrafficMode::Sgv,
            traffic_days: "Mo-Fr".to_string(),
            valid_from: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
            fee: 10.0,
            assignments: slots.iter().map(|s| Assignment::new(s.to_string())).collect(),
            status: RequestStatus::InReview,
            updated_at: Utc::now(),
        }
    }

    fn pot(slots: &[&str]) -> CapacityPot {
        CapacityPot {
            id: "pot".to_string(),
            section: "X-Y".to_string(),
            calendar_week: 10,
            traffic_days: "Mo-Fr".to_string(),
            traffic_mode: TrafficMode::Sgv,
            time_window_start: 8,
            max_capacity: 1,
            slot_ids: slots.iter().map(|s| s.to_string()).collect(),
            request_ids: Vec::new(),
        }
    }

    fn slot(id: &str) -> Slot {
        Slot {
            id: id.to_string(),
            structure: SlotStructure::Eltern,
            parent_kind: None,
            parent_id: None,
            child_ids: Vec::new(),
            line: "L1".to_string(),
            from: "X".to_string(),
            to: "Y".to_string(),
            departure: DepartureTime { hour: 8, minute: 15 },
            traffic_mode: TrafficMode::Sgv,
            calendar_week: 10,
            traffic_days: "Mo-Fr".to_string(),
            pot_id: Some("pot".to_string()),
        }
    }

    #[test]
    fn test_pot_scope_stamps_all_assignments_in_pot() {
        let scope = ConflictScope::for_pot(&pot(&["s1", "s2"]));
        let mut r = request(&["s1", "s2", "other"]);
        let conflict = "k".to_string();

        assert_eq!(scope.stamp(&mut r, PhaseStatus::AwaitingConflict, Some(&conflict)), 2);
        assert_eq!(r.assignments[2].status, AssignmentStatus::Unchecked);
        assert_eq!(r.assignments[0].pot_conflict_id.as_deref(), Some("k"));
        assert_eq!(scope.phase_of(&r), Some(PhaseStatus::AwaitingConflict));
    }

    #[test]
    fn test_slot_scope_stamps_single_assignment() {
        let scope = ConflictScope::for_slot(&slot("s1"));
        let mut r = request(&["s1", "s2"]);
        assert_eq!(scope.stamp(&mut r, PhaseStatus::Confirmed, None), 1);
        assert_eq!(r.assignments[0].status, AssignmentStatus::Slot(PhaseStatus::Confirmed));
        assert_eq!(r.assignments[0].last_slot_status, Some(AssignmentStatus::Slot(PhaseStatus::Confirmed)));
        assert_eq!(r.assignments[1].status, AssignmentStatus::Unchecked);
        assert_eq!(scope.capacity, 1);
        assert_eq!(scope.quota, None);
    }

    #[test]
    fn test_pot_activity_ignores_rejected() {
        let scope = ConflictScope::for_pot(&pot(&["s1"]));
        let mut r = request(&["s1"]);
        assert!(scope.is_pot_active(&r));
        scope.stamp(&mut r, PhaseStatus::RejectedByFee, None);
        assert!(!scope.is_pot_active(&r));
    }
}
