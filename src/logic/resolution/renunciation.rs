use std::collections::HashSet;

use crate::logic::error::{ArbitrationError, Result};
use crate::logic::resolution::ResolutionEngine;
use crate::logic::scope::ConflictScope;
use crate::model::{sorted_ids, ConflictDocument, ConflictStatus, DeferralEntry, Id, PhaseStatus, RenunciationDecision};
use crate::store::RequestBatch;

/// Verzicht/Verschub: withdraw requests, then either resolve or move on to fee comparison
pub(super) fn apply(
    scope: &ConflictScope,
    conflict: &mut ConflictDocument,
    decision: &RenunciationDecision,
    batch: &mut RequestBatch,
    engine: &ResolutionEngine,
) -> Result<()> {
    let renouncing = sorted_ids(&decision.renouncing);
    let deferring = dedupe_deferrals(&decision.deferring);
    let deferring_ids: Vec<Id> = deferring.iter().map(|d| d.request_id.clone()).collect();
    validate(conflict, &renouncing, &deferring_ids)?;

    scope.stamp_all(batch, &renouncing, PhaseStatus::Renounced, Some(&conflict.id));
    scope.stamp_all(batch, &deferring_ids, PhaseStatus::Deferred, Some(&conflict.id));

    let withdrawn: HashSet<&Id> = renouncing.iter().chain(deferring_ids.iter()).collect();
    let active: Vec<Id> = conflict
        .participants
        .iter()
        .filter(|id| !withdrawn.contains(id))
        .cloned()
        .collect();

    conflict.renounced = renouncing;
    conflict.deferred = deferring;
    conflict.winners.clear();
    conflict.clear_after_renunciation();
    conflict.status = ConflictStatus::after_renunciation(active.len() <= scope.capacity);

    let note = format!(
        "Verzicht/Verschub: {} verzichtet, {} verschoben, {} verbleibend",
        conflict.renounced.len(),
        conflict.deferred.len(),
        active.len()
    );
    if conflict.is_resolved() {
        scope.stamp_all(batch, &active, PhaseStatus::Confirmed, Some(&conflict.id));
        conflict.winners = active;
        conflict.close(engine.now);
    } else {
        scope.stamp_all(batch, &active, PhaseStatus::AwaitingFeeDecision, Some(&conflict.id));
    }
    engine.note(conflict, &note);
    Ok(())
}

fn validate(conflict: &ConflictDocument, renouncing: &[Id], deferring: &[Id]) -> Result<()> {
    if let Some(stranger) = renouncing
        .iter()
        .chain(deferring.iter())
        .find(|id| !conflict.participants.contains(id))
    {
        return Err(ArbitrationError::InvalidInput(format!(
            "request {} is not a participant of conflict {}",
            stranger, conflict.id
        )));
    }
    if let Some(both) = renouncing.iter().find(|id| deferring.contains(id)) {
        return Err(ArbitrationError::InvalidInput(format!(
            "request {} cannot renounce and defer at the same time",
            both
        )));
    }
    Ok(())
}

/// First entry per request wins
fn dedupe_deferrals(entries: &[DeferralEntry]) -> Vec<DeferralEntry> {
    let mut seen = HashSet::new();
    let mut deduped: Vec<DeferralEntry> = entries
        .iter()
        .filter(|e| seen.insert(e.request_id.clone()))
        .cloned()
        .collect();
    deduped.sort_by(|a, b| a.request_id.cmp(&b.request_id));
    deduped
}
