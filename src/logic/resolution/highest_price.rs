use std::collections::HashMap;

use crate::logic::error::Result;
use crate::logic::resolution::{allocate, ResolutionEngine};
use crate::logic::scope::ConflictScope;
use crate::model::{BidAmount, BidDecision, ConflictDocument, ConflictStatus, Id, PhaseStatus, RecordedBid};
use crate::store::RequestBatch;

enum Verdict {
    Valid(f64),
    Invalid(Option<f64>),
    Missing,
}

/// Höchstpreisverfahren: one sealed-bid round over the requests still waiting on it.
///
/// A bid must be a finite number strictly above the request's fee. Invalid and
/// missing bids only knock out their own request. A tie that does not fit the
/// remaining capacity stays pending for another round.
pub(super) fn apply(
    scope: &ConflictScope,
    conflict: &mut ConflictDocument,
    decision: &BidDecision,
    batch: &mut RequestBatch,
    engine: &ResolutionEngine,
) -> Result<()> {
    let candidates: Vec<Id> = conflict
        .participants
        .iter()
        .filter(|id| {
            batch
                .get(id)
                .and_then(|r| scope.phase_of(r))
                .is_some_and(|p| p == PhaseStatus::AwaitingHighestPrice)
        })
        .cloned()
        .collect();

    let mut submitted: HashMap<&Id, &BidAmount> = HashMap::new();
    for bid in &decision.bids {
        if !candidates.contains(&bid.request_id) {
            log::warn!(
                "Ignoring bid for {} in conflict {}, not a highest-price candidate",
                bid.request_id,
                conflict.id
            );
            continue;
        }
        submitted.entry(&bid.request_id).or_insert(&bid.amount);
    }

    let round = conflict.bids.iter().map(|b| b.round).max().unwrap_or(0) + 1;
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    let mut missing = Vec::new();
    let mut recorded = Vec::new();
    for id in &candidates {
        let fee = batch.get(id).map(|r| r.fee).unwrap_or(f64::INFINITY);
        let verdict = match submitted.get(id) {
            None => Verdict::Missing,
            Some(amount) => match amount.as_number() {
                Some(value) if value > fee => Verdict::Valid(value),
                number => Verdict::Invalid(number),
            },
        };
        let (amount, is_valid) = match verdict {
            Verdict::Valid(value) => {
                valid.push((id.clone(), value));
                (Some(value), true)
            }
            Verdict::Invalid(number) => {
                invalid.push(id.clone());
                (number, false)
            }
            Verdict::Missing => {
                missing.push(id.clone());
                (None, false)
            }
        };
        recorded.push(RecordedBid {
            request_id: id.clone(),
            amount,
            round,
            valid: is_valid,
        });
    }

    let remaining = scope.capacity.saturating_sub(conflict.winners.len());
    let allocation = allocate(valid, remaining);

    scope.stamp_all(batch, &invalid, PhaseStatus::InvalidBid, Some(&conflict.id));
    scope.stamp_all(batch, &missing, PhaseStatus::NoBid, Some(&conflict.id));
    scope.stamp_all(batch, &allocation.winners, PhaseStatus::ConfirmedByHighestPrice, Some(&conflict.id));
    scope.stamp_all(batch, &allocation.tied, PhaseStatus::AwaitingHighestPrice, Some(&conflict.id));
    scope.stamp_all(batch, &allocation.losers, PhaseStatus::RejectedByHighestPrice, Some(&conflict.id));

    let note = format!(
        "Höchstpreis Runde {}: {} bestätigt, {} erneut gleichauf, {} unterlegen, {} ungültig, {} ohne Gebot",
        round,
        allocation.winners.len(),
        allocation.tied.len(),
        allocation.losers.len(),
        invalid.len(),
        missing.len()
    );
    conflict.bids.extend(recorded);
    conflict.winners.extend(allocation.winners);
    conflict.winners.sort();
    conflict
        .rejected_by_highest_price
        .extend(invalid.into_iter().chain(missing).chain(allocation.losers));
    conflict.rejected_by_highest_price.sort();
    conflict.status = ConflictStatus::after_highest_price(!allocation.tied.is_empty());
    if conflict.is_resolved() {
        conflict.close(engine.now);
    }
    engine.note(conflict, &note);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::logic::resolution::{Decision, ResolutionEngine};
    use crate::logic::test_support::*;
    use crate::model::{
        Bid, BidAmount, BidDecision, ConflictDocument, ConflictStatus, FeeDecision, PhaseStatus,
        RenunciationDecision, UserContext,
    };
    use crate::store::RequestBatch;
    use chrono::Utc;
    use serde_json::json;

    /// Run the first two phases so that the given requests wait on highest price
    fn to_highest_price(engine: &ResolutionEngine, conflict: &mut ConflictDocument, batch: &mut RequestBatch) {
        engine
            .apply(conflict, &Decision::Renunciation(RenunciationDecision::default()), batch)
            .unwrap();
        engine
            .apply(conflict, &Decision::FeeComparison(FeeDecision::default()), batch)
            .unwrap();
        assert_eq!(conflict.status, ConflictStatus::InHighestPrice);
    }

    fn bids(v: &[(&str, serde_json::Value)]) -> Decision {
        Decision::HighestPrice(BidDecision {
            bids: v
                .iter()
                .map(|(id, amount)| Bid {
                    request_id: id.to_string(),
                    amount: serde_json::from_value(amount.clone()).unwrap(),
                })
                .collect(),
        })
    }

    fn tied_pot() -> (crate::logic::snapshot::CatalogSnapshot, ConflictDocument, RequestBatch) {
        open_pot_conflict(
            2,
            &[("a", "E1", 1000.0), ("b", "E2", 900.0), ("c", "E3", 900.0), ("d", "E4", 700.0)],
        )
    }

    #[test]
    fn test_highest_bid_takes_remaining_capacity() {
        let (catalog, mut conflict, mut batch) = tied_pot();
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        engine
            .apply(&mut conflict, &bids(&[("b", json!(920.0)), ("c", json!(950.0))]), &mut batch)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.winners, ids(&["a", "c"]));
        assert_eq!(conflict.rejected_by_highest_price, ids(&["b"]));
        assert_eq!(phase(&batch, "c"), PhaseStatus::ConfirmedByHighestPrice);
        assert_eq!(phase(&batch, "b"), PhaseStatus::RejectedByHighestPrice);
        assert_eq!(conflict.bids.len(), 2);
        assert!(conflict.bids.iter().all(|b| b.round == 1 && b.valid));
        assert_eq!(conflict.decided_count(), conflict.participants.len());
    }

    #[test]
    fn test_invalid_and_missing_bids_resolve_without_winner() {
        let (catalog, mut conflict, mut batch) = tied_pot();
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        // b bids exactly its fee, c does not bid at all
        engine
            .apply(&mut conflict, &bids(&[("b", json!(900.0))]), &mut batch)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.winners, ids(&["a"]));
        assert_eq!(phase(&batch, "b"), PhaseStatus::InvalidBid);
        assert_eq!(phase(&batch, "c"), PhaseStatus::NoBid);
        assert_eq!(
            batch.get("c").unwrap().assignments[0].status.to_string(),
            "abgelehnt_topf_hoechstpreis_kein_gebot"
        );
        assert_eq!(conflict.rejected_by_highest_price, ids(&["b", "c"]));
    }

    #[test]
    fn test_malformed_bid_only_rejects_its_request() {
        let (catalog, mut conflict, mut batch) = tied_pot();
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        engine
            .apply(&mut conflict, &bids(&[("b", json!("viel")), ("c", json!(901.0))]), &mut batch)
            .unwrap();

        assert_eq!(phase(&batch, "b"), PhaseStatus::InvalidBid);
        assert_eq!(phase(&batch, "c"), PhaseStatus::ConfirmedByHighestPrice);
        assert!(matches!(
            serde_json::from_value::<BidAmount>(json!("viel")).unwrap(),
            BidAmount::Malformed(_)
        ));
    }

    #[test]
    fn test_tied_bids_repeat_in_next_round() {
        let (catalog, mut conflict, mut batch) = tied_pot();
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        engine
            .apply(&mut conflict, &bids(&[("b", json!(950.0)), ("c", json!(950.0))]), &mut batch)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::InHighestPrice);
        assert_eq!(phase(&batch, "b"), PhaseStatus::AwaitingHighestPrice);
        assert_eq!(phase(&batch, "c"), PhaseStatus::AwaitingHighestPrice);

        engine
            .apply(&mut conflict, &bids(&[("b", json!(990.0)), ("c", json!(980.0))]), &mut batch)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.winners, ids(&["a", "b"]));
        assert_eq!(conflict.bids.iter().filter(|b| b.round == 2).count(), 2);
    }

    #[test]
    fn test_slot_tie_with_lower_bidder() {
        let (catalog, mut conflict, mut batch) =
            open_slot_conflict(&[("a", "E1", 500.0), ("b", "E2", 500.0), ("c", "E3", 500.0)]);
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        engine
            .apply(
                &mut conflict,
                &bids(&[("a", json!(700.0)), ("b", json!(700.0)), ("c", json!(600.0))]),
                &mut batch,
            )
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::InHighestPrice);
        assert_eq!(phase(&batch, "c"), PhaseStatus::RejectedByHighestPrice);
        assert!(conflict.winners.is_empty());
    }

    fn tied_slot() -> (crate::logic::snapshot::CatalogSnapshot, ConflictDocument, RequestBatch) {
        open_slot_conflict(&[("a", "E1", 500.0), ("b", "E2", 500.0), ("c", "E3", 500.0)])
    }

    #[test]
    fn test_single_valid_slot_bid_wins() {
        let (catalog, mut conflict, mut batch) = tied_slot();
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        // b only matches its fee, c stays silent
        engine
            .apply(&mut conflict, &bids(&[("a", json!(650.0)), ("b", json!(500.0))]), &mut batch)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.winners, ids(&["a"]));
        assert_eq!(conflict.rejected_by_highest_price, ids(&["b", "c"]));
        assert_eq!(
            batch.get("a").unwrap().assignments[0].status.to_string(),
            "bestaetigt_slot_hoechstpreis"
        );
        assert_eq!(phase(&batch, "b"), PhaseStatus::InvalidBid);
        assert_eq!(phase(&batch, "c"), PhaseStatus::NoBid);
    }

    #[test]
    fn test_no_valid_slot_bid_leaves_slot_empty() {
        let (catalog, mut conflict, mut batch) = tied_slot();
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_highest_price(&engine, &mut conflict, &mut batch);

        engine
            .apply(&mut conflict, &bids(&[("a", json!("viel")), ("b", json!(499.0))]), &mut batch)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert!(conflict.closed_at.is_some());
        assert!(conflict.winners.is_empty());
        assert_eq!(conflict.rejected_by_highest_price, ids(&["a", "b", "c"]));
        assert_eq!(phase(&batch, "a"), PhaseStatus::InvalidBid);
        assert_eq!(phase(&batch, "c"), PhaseStatus::NoBid);
        assert!(conflict.bids.iter().all(|b| !b.valid));
        assert_eq!(conflict.decided_count(), conflict.participants.len());
    }
}
