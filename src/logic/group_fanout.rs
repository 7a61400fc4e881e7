//! Applies one decision to every member of a conflict group

use chrono::Utc;
use serde::Serialize;

use crate::logic::conflict_ops::{get_group, load_members, persist_action};
use crate::logic::error::{ArbitrationError, Result};
use crate::logic::resolution::{Decision, ResolutionEngine};
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{ConflictDocument, ConflictGroup, GroupStatus, GroupTally, Id, UserContext};
use crate::store::{GroupStore, RequestBatch, Store};

#[derive(Debug, Clone, Serialize)]
pub struct GroupActionOutcome {
    pub group: ConflictGroup,
    pub conflicts: Vec<ConflictDocument>,
    pub tally: GroupTally,
    /// Distinct requests written by the action
    pub requests_updated: usize,
}

fn tally(conflicts: &[ConflictDocument]) -> GroupTally {
    let resolved = conflicts.iter().filter(|c| c.is_resolved()).count();
    GroupTally {
        conflicts_in_group: conflicts.len(),
        resolved,
        open: conflicts.len() - resolved,
    }
}

async fn load_working_set<S: Store + ?Sized>(
    store: &S,
    group: &ConflictGroup,
) -> Result<(CatalogSnapshot, Vec<ConflictDocument>, RequestBatch)> {
    let catalog = CatalogSnapshot::load(store).await?;
    let members = load_members(store, group).await?;
    let mut batch = RequestBatch::new();
    for member in &members {
        batch.load_missing(store, &member.participants).await?;
    }
    Ok((catalog, members, batch))
}

async fn finish<S: Store + ?Sized>(
    store: &S,
    catalog: &CatalogSnapshot,
    group: ConflictGroup,
    members: Vec<ConflictDocument>,
    batch: RequestBatch,
) -> Result<GroupActionOutcome> {
    let (requests, _) = persist_action(store, catalog, batch, &members).await?;
    // participants never change inside an action, so the group keeps its id
    let group = match store.get_group(&group.id).await? {
        Some(updated) => updated,
        None => ConflictGroup {
            status: GroupStatus::derive(members.iter().map(|c| c.status)),
            ..group
        },
    };
    let tally = tally(&members);
    log::info!(
        "Group {}: {} conflicts, {} resolved, {} open, {} requests written",
        group.id,
        tally.conflicts_in_group,
        tally.resolved,
        tally.open,
        requests.len()
    );
    Ok(GroupActionOutcome {
        group,
        conflicts: members,
        tally,
        requests_updated: requests.len(),
    })
}

/// Same decision for every member; a request shared by several members is written once.
///
/// Every member must accept the phase. If any member fails, nothing is persisted.
pub async fn apply_to_group<S: Store + ?Sized>(
    store: &S,
    group_id: &Id,
    decision: &Decision,
    actor: &UserContext,
) -> Result<GroupActionOutcome> {
    let group = get_group(store, group_id).await?;
    if !group.status.accepts(decision.phase()) {
        return Err(ArbitrationError::Precondition(format!(
            "group {} in status {} does not accept {}",
            group.id,
            group.status,
            decision.phase()
        )));
    }

    let (catalog, mut members, mut batch) = load_working_set(store, &group).await?;
    let engine = ResolutionEngine::new(&catalog, actor, Utc::now());
    for member in members.iter_mut() {
        engine.apply(member, decision, &mut batch)?;
    }
    finish(store, &catalog, group, members, batch).await
}

/// Reopen every member and send its participants back to waiting; the way out of `invalide`
pub async fn reset_group<S: Store + ?Sized>(
    store: &S,
    group_id: &Id,
    actor: &UserContext,
) -> Result<GroupActionOutcome> {
    let group = get_group(store, group_id).await?;
    let (catalog, mut members, mut batch) = load_working_set(store, &group).await?;

    let now = Utc::now();
    let note = format!("Gruppe zurückgesetzt ({})", actor.display_name());
    for member in members.iter_mut() {
        let scope = catalog.scope_for(member)?;
        let participants = member.participants.clone();
        member.reset(&participants, &note, now);
        scope.restart(&mut batch, &participants, &member.id);
    }
    log::info!("Reset {} conflicts of group {}", members.len(), group.id);
    finish(store, &catalog, group, members, batch).await
}
