//! Pot-level conflict detection ("Kapazitaetstopf" overbooking)

use chrono::{DateTime, Utc};

use crate::logic::detection::{latest_by_resource, DetectionOutcome, DetectionSummary};
use crate::logic::scope::ConflictScope;
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{
    AssignmentStatus, ConflictDocument, ConflictTrigger, Id, PhaseStatus,
};
use crate::store::RequestBatch;

pub struct PotConflictDetector;

impl PotConflictDetector {
    /// Compare every pot's active request count with its capacity and bring the
    /// pot's conflict document and assignment statuses in line.
    ///
    /// `existing` are the persisted pot conflicts; `batch` must contain every
    /// request listed on the pots. Running twice on unchanged data changes nothing.
    pub fn detect(
        catalog: &CatalogSnapshot,
        existing: Vec<ConflictDocument>,
        batch: &mut RequestBatch,
        now: DateTime<Utc>,
    ) -> DetectionOutcome {
        let mut latest = latest_by_resource(existing);
        let mut summary = DetectionSummary::default();
        let mut changed = Vec::new();

        for pot in catalog.sorted_pots() {
            summary.resources_checked += 1;
            let scope = ConflictScope::for_pot(pot);

            let mut touching: Vec<Id> = pot
                .request_ids
                .iter()
                .filter(|id| batch.get(id).is_some_and(|r| scope.touches(r)))
                .cloned()
                .collect();
            touching.sort();
            touching.dedup();

            let active: Vec<Id> = touching
                .iter()
                .filter(|id| batch.get(id).is_some_and(|r| scope.is_pot_active(r)))
                .cloned()
                .collect();

            let current = latest.remove(&pot.id);

            if active.len() > pot.max_capacity {
                match current {
                    None => {
                        let conflict = ConflictDocument::open(
                            ConflictTrigger::Pot {
                                triggering_pot: pot.id.clone(),
                            },
                            &touching,
                            now,
                        );
                        scope.restart(batch, &touching, &conflict.id);
                        log::info!(
                            "Pot {} overbooked ({} active, capacity {}), opened conflict {}",
                            pot.id,
                            active.len(),
                            pot.max_capacity,
                            conflict.id
                        );
                        summary.created += 1;
                        changed.push(conflict);
                    }
                    Some(conflict) if conflict.has_participants(&touching) => {
                        log::debug!("Pot {} conflict {} unchanged", pot.id, conflict.id);
                        summary.unchanged += 1;
                    }
                    Some(mut conflict) => {
                        let note = format!(
                            "Beteiligte geändert ({} -> {} Anfragen), Konflikt zurückgesetzt",
                            conflict.participants.len(),
                            touching.len()
                        );
                        conflict.reset(&touching, &note, now);
                        scope.restart(batch, &touching, &conflict.id);
                        log::info!("Pot {} participants changed, reset conflict {}", pot.id, conflict.id);
                        summary.reset += 1;
                        changed.push(conflict);
                    }
                }
                continue;
            }

            match current {
                Some(mut conflict) if !conflict.is_resolved() => {
                    conflict.winners = active.clone();
                    conflict.append_note("Kapazität ausreichend, automatisch gelöst", now);
                    conflict.close(now);
                    for id in &active {
                        if let Some(request) = batch.get_mut(id) {
                            scope.stamp_where(request, PhaseStatus::Confirmed, Some(&conflict.id), |a| {
                                !a.status.is_rejected() && !a.is_past_pot_phase()
                            });
                        }
                    }
                    log::info!("Pot {} no longer overbooked, closed conflict {}", pot.id, conflict.id);
                    summary.auto_closed += 1;
                    changed.push(conflict);
                }
                _ => {
                    for id in &active {
                        let Some(request) = batch.get_mut(id) else {
                            continue;
                        };
                        let stamped = scope.stamp_where(request, PhaseStatus::Confirmed, None, |a| {
                            !a.status.is_rejected()
                                && !a.is_past_pot_phase()
                                && !matches!(a.status, AssignmentStatus::Pot(p) if p.is_confirmed())
                        });
                        if stamped > 0 {
                            summary.confirmed_directly += 1;
                        }
                    }
                }
            }
        }

        DetectionOutcome {
            summary,
            conflicts: changed,
        }
    }
}
