//! Slot-level conflict detection, run once all pot conflicts are resolved

use chrono::{DateTime, Utc};

use crate::logic::detection::{latest_by_resource, DetectionOutcome, DetectionSummary};
use crate::logic::error::{ArbitrationError, Result};
use crate::logic::scope::ConflictScope;
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{AssignmentStatus, ConflictDocument, ConflictKind, ConflictTrigger, Id, PhaseStatus};
use crate::store::RequestBatch;

pub struct SlotConflictDetector;

impl SlotConflictDetector {
    /// Slot detection is only meaningful once every pot conflict is resolved
    pub fn check_precondition(pot_conflicts: &[ConflictDocument]) -> Result<()> {
        let open: Vec<&Id> = pot_conflicts
            .iter()
            .filter(|c| !c.is_resolved())
            .map(|c| &c.id)
            .collect();
        if open.is_empty() {
            return Ok(());
        }
        Err(ArbitrationError::Precondition(format!(
            "{} pot conflict(s) still unresolved, first: {}",
            open.len(),
            open[0]
        )))
    }

    /// Same create/reset/no-op/auto-close cycle as on pot level, per parent slot.
    ///
    /// Capacity is one, except for night parents which are never constrained here.
    /// The frozen participant set includes requests already decided on this slot,
    /// so a running arbitration does not look like a changed set.
    pub fn detect(
        catalog: &CatalogSnapshot,
        pot_conflicts: &[ConflictDocument],
        existing: Vec<ConflictDocument>,
        batch: &mut RequestBatch,
        now: DateTime<Utc>,
    ) -> Result<DetectionOutcome> {
        Self::check_precondition(pot_conflicts)?;

        let mut latest = latest_by_resource(existing);
        let mut summary = DetectionSummary::default();
        let mut changed = Vec::new();

        for slot in catalog.sorted_parent_slots() {
            let Some(pot) = slot.pot_id.as_ref().and_then(|id| catalog.pot(id)) else {
                log::warn!("Parent slot {} has no capacity pot, skipped", slot.id);
                continue;
            };
            summary.resources_checked += 1;
            let scope = ConflictScope::for_slot(slot);

            let status_of = |id: &Id| batch.get(id).and_then(|r| scope.status_of(r));
            let mut decided: Vec<Id> = pot
                .request_ids
                .iter()
                .filter(|id| status_of(id).is_some_and(AssignmentStatus::is_slot_active_or_decided))
                .cloned()
                .collect();
            decided.sort();
            decided.dedup();
            let active: Vec<Id> = decided
                .iter()
                .filter(|id| status_of(id).is_some_and(AssignmentStatus::is_slot_active))
                .cloned()
                .collect();

            let capacity = if slot.is_night() { active.len() + 1 } else { 1 };
            let current = latest.remove(&slot.id);

            if active.len() > capacity {
                match current {
                    None => {
                        let conflict = ConflictDocument::open(
                            ConflictTrigger::Slot {
                                triggering_slot: slot.id.clone(),
                            },
                            &decided,
                            now,
                        );
                        scope.restart(batch, &decided, &conflict.id);
                        log::info!(
                            "Slot {} requested {} times, opened conflict {}",
                            slot.id,
                            active.len(),
                            conflict.id
                        );
                        summary.created += 1;
                        changed.push(conflict);
                    }
                    Some(conflict) if conflict.has_participants(&decided) && !conflict.is_resolved() => {
                        log::debug!("Slot {} conflict {} unchanged", slot.id, conflict.id);
                        summary.unchanged += 1;
                    }
                    Some(mut conflict) => {
                        let same_participants = conflict.has_participants(&decided);
                        // resolved but overbooked again: the participants went back through pot arbitration
                        if same_participants {
                            if let Some(outcome) = recorded_outcome(&scope, batch, &decided, capacity) {
                                for (id, phase) in &outcome {
                                    if let Some(request) = batch.get_mut(id) {
                                        scope.stamp(request, *phase, Some(&conflict.id));
                                    }
                                }
                                log::info!(
                                    "Slot {} outcome of resolved conflict {} restored from snapshots",
                                    slot.id,
                                    conflict.id
                                );
                                summary.restored += 1;
                                continue;
                            }
                        }
                        let note = if same_participants {
                            "Slot erneut überbucht, gelöster Konflikt wieder geöffnet".to_string()
                        } else {
                            format!(
                                "Beteiligte geändert ({} -> {} Anfragen), Konflikt zurückgesetzt",
                                conflict.participants.len(),
                                decided.len()
                            )
                        };
                        conflict.reset(&decided, &note, now);
                        scope.restart(batch, &decided, &conflict.id);
                        log::info!("Slot {} participants changed, reset conflict {}", slot.id, conflict.id);
                        summary.reset += 1;
                        changed.push(conflict);
                    }
                }
                continue;
            }

            match current {
                Some(mut conflict) if !conflict.is_resolved() => {
                    conflict.winners = active.clone();
                    conflict.append_note("Slot nicht mehr überbucht, automatisch gelöst", now);
                    conflict.close(now);
                    scope.stamp_all(batch, &active, PhaseStatus::Confirmed, Some(&conflict.id));
                    log::info!("Slot {} no longer contested, closed conflict {}", slot.id, conflict.id);
                    summary.auto_closed += 1;
                    changed.push(conflict);
                }
                _ => {
                    for id in &active {
                        let Some(request) = batch.get_mut(id) else {
                            continue;
                        };
                        // only pot winners that have not been looked at on slot level yet
                        let stamped = scope.stamp_where(request, PhaseStatus::Confirmed, None, |a| {
                            matches!(a.status, AssignmentStatus::Pot(p) if p.is_confirmed())
                        });
                        if stamped > 0 {
                            summary.confirmed_directly += 1;
                        }
                    }
                }
            }
        }

        Ok(DetectionOutcome {
            summary,
            conflicts: changed,
        })
    }
}

/// Last terminal slot status of every participant, if all have one and the winners fit the slot
fn recorded_outcome(
    scope: &ConflictScope,
    batch: &RequestBatch,
    participants: &[Id],
    capacity: usize,
) -> Option<Vec<(Id, PhaseStatus)>> {
    let outcome: Vec<(Id, PhaseStatus)> = participants
        .iter()
        .map(|id| {
            let snapshot = batch
                .get(id)
                .and_then(|r| scope.assignments(r).next())
                .and_then(|a| a.last_slot_status)
                .and_then(|s| s.phase_at(ConflictKind::Slot))?;
            Some((id.clone(), snapshot))
        })
        .collect::<Option<_>>()?;
    let winners = outcome.iter().filter(|(_, phase)| phase.is_confirmed()).count();
    (winners <= capacity).then_some(outcome)
}
