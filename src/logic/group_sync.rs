//! Derives conflict groups from the full set of conflict documents

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::logic::error::{ArbitrationError, Result};
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{deterministic_id, sorted_ids, ConflictDocument, ConflictGroup, ConflictTrigger, GroupStatus, Id};
use crate::store::{ConflictStore, GroupStore, Store};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub groups: usize,
    pub written: usize,
    pub deleted: usize,
}

/// Result of bucketing, before anything is written
#[derive(Debug, Default)]
pub struct GroupPlan {
    /// Every group that should exist, in key order
    pub groups: Vec<ConflictGroup>,
    /// Subset of `groups` that differs from what is persisted
    pub changed: Vec<ConflictGroup>,
    pub stale: Vec<Id>,
}

pub struct GroupSynchronizer;

impl GroupSynchronizer {
    /// Resource shape plus sorted participants; equal keys are resolved together
    pub fn group_key(catalog: &CatalogSnapshot, conflict: &ConflictDocument) -> Result<String> {
        let shape = match &conflict.trigger {
            ConflictTrigger::Pot { triggering_pot } => catalog
                .pot(triggering_pot)
                .map(|pot| pot.shape_key())
                .ok_or_else(|| {
                    ArbitrationError::DataIntegrity(format!(
                        "conflict {} references unknown capacity pot {}",
                        conflict.id, triggering_pot
                    ))
                })?,
            ConflictTrigger::Slot { triggering_slot } => catalog
                .slot(triggering_slot)
                .map(|slot| slot.shape_key())
                .ok_or_else(|| {
                    ArbitrationError::DataIntegrity(format!(
                        "conflict {} references unknown slot {}",
                        conflict.id, triggering_slot
                    ))
                })?,
        };
        Ok(format!("{}|{}", shape, sorted_ids(&conflict.participants).join(",")))
    }

    pub fn plan(
        catalog: &CatalogSnapshot,
        conflicts: &[ConflictDocument],
        existing: Vec<ConflictGroup>,
        now: DateTime<Utc>,
    ) -> Result<GroupPlan> {
        let mut buckets: BTreeMap<String, Vec<&ConflictDocument>> = BTreeMap::new();
        for conflict in conflicts {
            buckets
                .entry(Self::group_key(catalog, conflict)?)
                .or_default()
                .push(conflict);
        }

        let mut persisted: HashMap<String, ConflictGroup> =
            existing.into_iter().map(|g| (g.key.clone(), g)).collect();

        let mut plan = GroupPlan::default();
        for (key, members) in buckets {
            let mut conflict_ids: Vec<Id> = members.iter().map(|c| c.id.clone()).collect();
            conflict_ids.sort();
            let status = GroupStatus::derive(members.iter().map(|c| c.status));
            let previous = persisted.remove(&key);

            let mut group = ConflictGroup {
                id: deterministic_id("grp", &key),
                conflict_kind: members[0].kind(),
                participants: sorted_ids(&members[0].participants),
                conflict_ids,
                status,
                created_at: previous.as_ref().map_or(now, |g| g.created_at),
                updated_at: now,
                key,
            };
            let unchanged = previous.as_ref().is_some_and(|p| {
                p.conflict_ids == group.conflict_ids && p.status == group.status && p.participants == group.participants
            });
            if unchanged {
                if let Some(p) = previous {
                    group.updated_at = p.updated_at;
                }
            } else {
                if status == GroupStatus::Invalid {
                    log::warn!("Group {} has members in differing statuses", group.id);
                }
                plan.changed.push(group.clone());
            }
            plan.groups.push(group);
        }

        plan.stale = persisted.into_values().map(|g| g.id).collect();
        plan.stale.sort();
        Ok(plan)
    }

    /// Rebuild all groups from the stored conflicts; last step of every detection and resolution
    pub async fn sync<S: Store + ?Sized>(store: &S, catalog: &CatalogSnapshot) -> Result<SyncSummary> {
        let conflicts = store.list_conflicts(None).await?;
        let existing = store.list_groups().await?;
        let plan = Self::plan(catalog, &conflicts, existing, Utc::now())?;

        for group in &plan.changed {
            store.upsert_group(group.clone()).await?;
        }
        let mut deleted = 0;
        for id in &plan.stale {
            if store.delete_group(id).await? {
                deleted += 1;
            }
        }

        let summary = SyncSummary {
            groups: plan.groups.len(),
            written: plan.changed.len(),
            deleted,
        };
        log::debug!(
            "Group sync: {} groups, {} written, {} deleted",
            summary.groups,
            summary.written,
            summary.deleted
        );
        Ok(summary)
    }
}
