//! Store-backed operations: detection passes, single-conflict actions and queries.
//!
//! Each operation reads a fresh working set, runs the synchronous engine on it and
//! persists requests, conflicts and groups in that order. Group synchronisation is
//! always the last step.

use chrono::Utc;
use serde::Serialize;

use crate::logic::detection::DetectionSummary;
use crate::logic::error::{ArbitrationError, Result};
use crate::logic::group_sync::{GroupSynchronizer, SyncSummary};
use crate::logic::pot_detection::PotConflictDetector;
use crate::logic::resolution::{Decision, ResolutionEngine};
use crate::logic::slot_detection::SlotConflictDetector;
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{
    ConflictDocument, ConflictFilter, ConflictGroup, ConflictKind, GroupFilter, Id, Page, Paged, Request,
    UserContext,
};
use crate::store::{ConflictStore, GroupStore, RequestBatch, RequestStore, Store};

#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub kind: ConflictKind,
    pub summary: DetectionSummary,
    pub conflicts: Vec<ConflictDocument>,
    pub groups: SyncSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictActionOutcome {
    pub conflict: ConflictDocument,
    /// Requests whose assignments changed
    pub requests: Vec<Request>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: ConflictGroup,
    pub conflicts: Vec<ConflictDocument>,
}

/// Persist one action's working set, then rebuild the groups
pub(crate) async fn persist_action<S: Store + ?Sized>(
    store: &S,
    catalog: &CatalogSnapshot,
    batch: RequestBatch,
    conflicts: &[ConflictDocument],
) -> Result<(Vec<Request>, SyncSummary)> {
    let requests = batch.commit(store).await?;
    for conflict in conflicts {
        store.upsert_conflict(conflict.clone()).await?;
    }
    let groups = GroupSynchronizer::sync(store, catalog).await?;
    Ok((requests, groups))
}

pub async fn detect_pot_conflicts<S: Store + ?Sized>(store: &S) -> Result<DetectionReport> {
    let catalog = CatalogSnapshot::load(store).await?;
    let existing = store.list_conflicts(Some(ConflictKind::Pot)).await?;

    let mut batch = RequestBatch::new();
    for pot in catalog.sorted_pots() {
        batch.load_missing(store, &pot.request_ids).await?;
    }

    let outcome = PotConflictDetector::detect(&catalog, existing, &mut batch, Utc::now());
    let (requests, groups) = persist_action(store, &catalog, batch, &outcome.conflicts).await?;
    log::info!(
        "Pot detection: {} pots, {} created, {} reset, {} closed, {} requests written",
        outcome.summary.resources_checked,
        outcome.summary.created,
        outcome.summary.reset,
        outcome.summary.auto_closed,
        requests.len()
    );
    Ok(DetectionReport {
        kind: ConflictKind::Pot,
        summary: outcome.summary,
        conflicts: outcome.conflicts,
        groups,
    })
}

pub async fn detect_slot_conflicts<S: Store + ?Sized>(store: &S) -> Result<DetectionReport> {
    let pot_conflicts = store.list_conflicts(Some(ConflictKind::Pot)).await?;
    SlotConflictDetector::check_precondition(&pot_conflicts)?;

    let catalog = CatalogSnapshot::load(store).await?;
    let existing = store.list_conflicts(Some(ConflictKind::Slot)).await?;
    let mut batch = RequestBatch::new();
    for pot in catalog.sorted_pots() {
        batch.load_missing(store, &pot.request_ids).await?;
    }

    let outcome = SlotConflictDetector::detect(&catalog, &pot_conflicts, existing, &mut batch, Utc::now())?;
    let (requests, groups) = persist_action(store, &catalog, batch, &outcome.conflicts).await?;
    log::info!(
        "Slot detection: {} slots, {} created, {} reset, {} closed, {} restored, {} requests written",
        outcome.summary.resources_checked,
        outcome.summary.created,
        outcome.summary.reset,
        outcome.summary.auto_closed,
        outcome.summary.restored,
        requests.len()
    );
    Ok(DetectionReport {
        kind: ConflictKind::Slot,
        summary: outcome.summary,
        conflicts: outcome.conflicts,
        groups,
    })
}

/// Apply one phase decision to a single conflict
pub async fn apply_to_conflict<S: Store + ?Sized>(
    store: &S,
    conflict_id: &Id,
    decision: &Decision,
    actor: &UserContext,
) -> Result<ConflictActionOutcome> {
    let mut conflict = get_conflict(store, conflict_id).await?;
    crate::logic::resolution::ensure_accepts(&conflict, decision.phase())?;

    let catalog = CatalogSnapshot::load(store).await?;
    let mut batch = RequestBatch::new();
    batch.load_missing(store, &conflict.participants).await?;

    ResolutionEngine::new(&catalog, actor, Utc::now()).apply(&mut conflict, decision, &mut batch)?;
    let (requests, _) = persist_action(store, &catalog, batch, std::slice::from_ref(&conflict)).await?;
    Ok(ConflictActionOutcome { conflict, requests })
}

pub async fn get_conflict<S: Store + ?Sized>(store: &S, conflict_id: &Id) -> Result<ConflictDocument> {
    store
        .get_conflict(conflict_id)
        .await?
        .ok_or_else(|| ArbitrationError::not_found("Conflict", conflict_id.clone()))
}

pub async fn list_conflicts<S: Store + ?Sized>(
    store: &S,
    filter: &ConflictFilter,
    page: Page,
) -> Result<Paged<ConflictDocument>> {
    let conflicts: Vec<ConflictDocument> = store
        .list_conflicts(filter.kind)
        .await?
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect();
    Ok(page.paged(conflicts))
}

pub async fn list_groups<S: Store + ?Sized>(store: &S, filter: &GroupFilter, page: Page) -> Result<Paged<ConflictGroup>> {
    let groups: Vec<ConflictGroup> = store
        .list_groups()
        .await?
        .into_iter()
        .filter(|g| filter.matches(g))
        .collect();
    Ok(page.paged(groups))
}

pub async fn get_group<S: Store + ?Sized>(store: &S, group_id: &Id) -> Result<ConflictGroup> {
    store
        .get_group(group_id)
        .await?
        .ok_or_else(|| ArbitrationError::not_found("Conflict group", group_id.clone()))
}

/// Member conflicts of a group; a member id without document is an integrity violation
pub async fn load_members<S: Store + ?Sized>(store: &S, group: &ConflictGroup) -> Result<Vec<ConflictDocument>> {
    let mut members = Vec::with_capacity(group.conflict_ids.len());
    for id in &group.conflict_ids {
        let conflict = store.get_conflict(id).await?.ok_or_else(|| {
            ArbitrationError::DataIntegrity(format!("group {} lists unknown conflict {}", group.id, id))
        })?;
        members.push(conflict);
    }
    Ok(members)
}

pub async fn get_group_detail<S: Store + ?Sized>(store: &S, group_id: &Id) -> Result<GroupDetail> {
    let group = get_group(store, group_id).await?;
    let conflicts = load_members(store, &group).await?;
    Ok(GroupDetail { group, conflicts })
}

pub async fn get_request<S: Store + ?Sized>(store: &S, request_id: &Id) -> Result<Request> {
    store
        .get_request(request_id)
        .await?
        .ok_or_else(|| ArbitrationError::not_found("Request", request_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::test_support::*;
    use crate::model::{ConflictStatus, GroupStatus, PhaseStatus, RenunciationDecision, RequestStatus};

    #[tokio::test]
    async fn test_pot_detection_persists_conflicts_groups_and_requests() {
        let (catalog, requests) = pot_fixture(1, &[("a", "E1", 100.0), ("b", "E2", 90.0)]);
        let store = seeded_store(&catalog, requests).await;

        let report = detect_pot_conflicts(&store).await.unwrap();

        assert_eq!(report.summary.created, 1);
        assert_eq!(report.groups.groups, 1);
        let request = get_request(&store, &"a".to_string()).await.unwrap();
        assert_eq!(request.status, RequestStatus::InConflictResolution);
        let groups = list_groups(&store, &GroupFilter::default(), Page::default()).await.unwrap();
        assert_eq!(groups.total, 1);
        assert_eq!(groups.items[0].status, GroupStatus::Open);

        let again = detect_pot_conflicts(&store).await.unwrap();
        assert_eq!(again.summary.unchanged, 1);
        assert!(again.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_slot_detection_requires_resolved_pots() {
        let (catalog, requests) = pot_fixture(1, &[("a", "E1", 100.0), ("b", "E2", 90.0)]);
        let store = seeded_store(&catalog, requests).await;
        detect_pot_conflicts(&store).await.unwrap();

        let result = detect_slot_conflicts(&store).await;

        assert!(matches!(result, Err(ArbitrationError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_conflict_action_updates_store() {
        let (catalog, requests) = pot_fixture(1, &[("a", "E1", 100.0), ("b", "E2", 90.0)]);
        let store = seeded_store(&catalog, requests).await;
        let report = detect_pot_conflicts(&store).await.unwrap();
        let conflict_id = report.conflicts[0].id.clone();

        let decision = Decision::Renunciation(RenunciationDecision {
            renouncing: ids(&["b"]),
            deferring: Vec::new(),
        });
        let outcome = apply_to_conflict(&store, &conflict_id, &decision, &UserContext::system())
            .await
            .unwrap();

        assert_eq!(outcome.conflict.status, ConflictStatus::Resolved);
        assert_eq!(outcome.requests.len(), 2);
        let stored = get_conflict(&store, &conflict_id).await.unwrap();
        assert_eq!(stored.status, ConflictStatus::Resolved);
        let a = get_request(&store, &"a".to_string()).await.unwrap();
        assert_eq!(a.assignments[0].status.phase(), Some(PhaseStatus::Confirmed));
        assert_eq!(a.status, RequestStatus::FullyConfirmed);
        let b = get_request(&store, &"b".to_string()).await.unwrap();
        assert_eq!(b.status, RequestStatus::FullyRejected);

        // a second renunciation no longer fits the conflict status
        let again = apply_to_conflict(&store, &conflict_id, &decision, &UserContext::system()).await;
        assert!(matches!(again, Err(ArbitrationError::PhaseNotAccepted { .. })));
    }

    #[tokio::test]
    async fn test_list_conflicts_filters_and_pages() {
        let (catalog, requests) = pot_fixture(1, &[("a", "E1", 100.0), ("b", "E2", 90.0)]);
        let store = seeded_store(&catalog, requests).await;
        detect_pot_conflicts(&store).await.unwrap();

        let by_request = ConflictFilter {
            request_id: Some("a".to_string()),
            ..Default::default()
        };
        let found = list_conflicts(&store, &by_request, Page::default()).await.unwrap();
        assert_eq!(found.total, 1);

        let resolved = ConflictFilter {
            status: Some(ConflictStatus::Resolved),
            ..Default::default()
        };
        let none = list_conflicts(&store, &resolved, Page::default()).await.unwrap();
        assert_eq!(none.total, 0);

        let missing = get_conflict(&store, &"nope".to_string()).await;
        assert!(matches!(missing, Err(ArbitrationError::NotFound { .. })));
    }
}
