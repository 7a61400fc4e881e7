use std::collections::HashSet;

use itertools::Itertools;

use crate::logic::error::{ArbitrationError, Result};
use crate::logic::resolution::{allocate, ResolutionEngine};
use crate::logic::scope::ConflictScope;
use crate::model::{
    sorted_ids, ConflictDocument, ConflictStatus, FeeDecision, FeeRankingEntry, Id, PhaseStatus,
};
use crate::store::RequestBatch;

struct Contender {
    id: Id,
    operator: String,
    fee: f64,
}

/// Entgeltvergleich: market-share quota (pot level only), then fee ranking in tie blocks
pub(super) fn apply(
    scope: &ConflictScope,
    conflict: &mut ConflictDocument,
    decision: &FeeDecision,
    batch: &mut RequestBatch,
    engine: &ResolutionEngine,
) -> Result<()> {
    let contenders = contenders(conflict, batch)?;
    let over_quota = match scope.quota {
        Some(quota) => market_share_cut(&contenders, quota, decision)?,
        None => Vec::new(),
    };

    let over_quota_set: HashSet<&Id> = over_quota.iter().collect();
    let survivors: Vec<&Contender> = contenders
        .iter()
        .filter(|c| !over_quota_set.contains(&c.id))
        .collect();
    let ranking = fee_ranking(&survivors);
    let allocation = allocate(
        survivors.iter().map(|c| (c.id.clone(), c.fee)).collect(),
        scope.capacity,
    );

    scope.stamp_all(batch, &over_quota, PhaseStatus::RejectedByMarketShare, Some(&conflict.id));
    scope.stamp_all(batch, &allocation.winners, PhaseStatus::ConfirmedByFee, Some(&conflict.id));
    scope.stamp_all(batch, &allocation.tied, PhaseStatus::AwaitingHighestPrice, Some(&conflict.id));
    scope.stamp_all(batch, &allocation.losers, PhaseStatus::RejectedByFee, Some(&conflict.id));

    let note = format!(
        "Entgeltvergleich: {} bestätigt, {} Höchstpreis, {} abgelehnt, {} Marktanteil",
        allocation.winners.len(),
        allocation.tied.len(),
        allocation.losers.len(),
        over_quota.len()
    );
    conflict.rejected_by_market_share = sorted_ids(&over_quota);
    conflict.rejected_by_fee = sorted_ids(&allocation.losers);
    conflict.rejected_by_highest_price.clear();
    conflict.bids.clear();
    conflict.winners = sorted_ids(&allocation.winners);
    conflict.fee_ranking = ranking;
    conflict.status = ConflictStatus::after_fee_comparison(!allocation.tied.is_empty());
    if conflict.is_resolved() {
        conflict.close(engine.now);
    }
    engine.note(conflict, &note);
    Ok(())
}

/// Participants still in the race after renunciation, with the data the ranking needs
fn contenders(conflict: &ConflictDocument, batch: &RequestBatch) -> Result<Vec<Contender>> {
    let withdrawn: HashSet<Id> = conflict
        .renounced
        .iter()
        .cloned()
        .chain(conflict.deferred_ids())
        .collect();
    conflict
        .participants
        .iter()
        .filter(|id| !withdrawn.contains(*id))
        .map(|id| {
            let request = batch.get(id).ok_or_else(|| {
                ArbitrationError::DataIntegrity(format!(
                    "conflict {} references unknown request {}",
                    conflict.id, id
                ))
            })?;
            Ok(Contender {
                id: id.clone(),
                operator: request.operator.clone(),
                fee: request.fee,
            })
        })
        .collect()
}

/// Requests cut by the quota; operators above it must rank all their active requests
fn market_share_cut(contenders: &[Contender], quota: usize, decision: &FeeDecision) -> Result<Vec<Id>> {
    let by_operator = contenders
        .iter()
        .map(|c| (c.operator.as_str(), c.id.clone()))
        .into_group_map();

    let mut cut = Vec::new();
    for (operator, ids) in by_operator.into_iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        if ids.len() <= quota {
            continue;
        }
        let ranking = decision.ranking_for(operator).ok_or_else(|| {
            ArbitrationError::InvalidInput(format!(
                "operator {} has {} requests above the market-share quota of {}, a priority ranking is required",
                operator,
                ids.len(),
                quota
            ))
        })?;
        let ranked = &ranking.request_ids;
        if ranked.len() != ids.len() || sorted_ids(ranked) != sorted_ids(&ids) {
            return Err(ArbitrationError::InvalidInput(format!(
                "ranking of operator {} must list each of its {} active requests exactly once",
                operator,
                ids.len()
            )));
        }
        log::debug!("Operator {} cut to {} of {} requests by market share", operator, quota, ids.len());
        cut.extend(ranked[quota..].iter().cloned());
    }
    Ok(cut)
}

/// Descending by fee; equal fees share a rank and the next rank skips accordingly
fn fee_ranking(survivors: &[&Contender]) -> Vec<FeeRankingEntry> {
    let sorted: Vec<&&Contender> = survivors
        .iter()
        .sorted_by(|a, b| b.fee.total_cmp(&a.fee).then_with(|| a.id.cmp(&b.id)))
        .collect();

    let mut entries: Vec<FeeRankingEntry> = Vec::with_capacity(sorted.len());
    for (position, contender) in sorted.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(previous) if previous.fee == contender.fee => previous.rank,
            _ => position + 1,
        };
        entries.push(FeeRankingEntry {
            request_id: contender.id.clone(),
            operator: contender.operator.clone(),
            fee: contender.fee,
            rank,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use crate::logic::error::ArbitrationError;
    use crate::logic::resolution::{Decision, ResolutionEngine};
    use crate::logic::test_support::*;
    use crate::model::{
        AssignmentStatus, ConflictStatus, FeeDecision, OperatorRanking, PhaseStatus, RenunciationDecision,
        UserContext,
    };
    use chrono::Utc;

    fn to_fee_phase(
        engine: &ResolutionEngine,
        conflict: &mut crate::model::ConflictDocument,
        batch: &mut crate::store::RequestBatch,
    ) {
        engine
            .apply(conflict, &Decision::Renunciation(RenunciationDecision::default()), batch)
            .unwrap();
        assert_eq!(conflict.status, ConflictStatus::InFeeComparison);
    }

    fn rankings(v: &[(&str, &[&str])]) -> Decision {
        Decision::FeeComparison(FeeDecision {
            operator_rankings: v
                .iter()
                .map(|(operator, request_ids)| OperatorRanking {
                    operator: operator.to_string(),
                    request_ids: ids(request_ids),
                })
                .collect(),
        })
    }

    #[test]
    fn test_fee_tie_at_capacity_boundary_goes_to_highest_price() {
        let (catalog, mut conflict, mut batch) = open_pot_conflict(
            2,
            &[("a", "E1", 1000.0), ("b", "E2", 900.0), ("c", "E3", 900.0), ("d", "E4", 700.0)],
        );
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_fee_phase(&engine, &mut conflict, &mut batch);

        engine.apply(&mut conflict, &rankings(&[]), &mut batch).unwrap();

        assert_eq!(conflict.status, ConflictStatus::InHighestPrice);
        assert_eq!(conflict.winners, ids(&["a"]));
        assert_eq!(conflict.rejected_by_fee, ids(&["d"]));
        assert_eq!(phase(&batch, "a"), PhaseStatus::ConfirmedByFee);
        assert_eq!(phase(&batch, "b"), PhaseStatus::AwaitingHighestPrice);
        assert_eq!(phase(&batch, "c"), PhaseStatus::AwaitingHighestPrice);
        assert_eq!(phase(&batch, "d"), PhaseStatus::RejectedByFee);
        let ranks: Vec<usize> = conflict.fee_ranking.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 2, 4]);
        assert_eq!(
            batch.get("d").unwrap().assignments[0].status.to_string(),
            "abgelehnt_topf_entgelt"
        );
    }

    #[test]
    fn test_distinct_fees_resolve_directly() {
        let (catalog, mut conflict, mut batch) =
            open_pot_conflict(1, &[("a", "E1", 1000.0), ("b", "E2", 900.0)]);
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_fee_phase(&engine, &mut conflict, &mut batch);

        engine.apply(&mut conflict, &rankings(&[]), &mut batch).unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert!(conflict.closed_at.is_some());
        assert_eq!(conflict.winners, ids(&["a"]));
        assert_eq!(conflict.decided_count(), conflict.participants.len());
    }

    #[test]
    fn test_market_share_quota_is_enforced() {
        // five slots in the pot, so one operator may keep two requests
        let (catalog, mut conflict, mut batch) = open_pot_conflict(
            3,
            &[
                ("a", "E1", 1000.0),
                ("b", "E1", 900.0),
                ("c", "E1", 800.0),
                ("d", "E2", 700.0),
                ("e", "E3", 600.0),
            ],
        );
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_fee_phase(&engine, &mut conflict, &mut batch);

        engine
            .apply(&mut conflict, &rankings(&[("E1", &["c", "a", "b"])]), &mut batch)
            .unwrap();

        assert_eq!(conflict.rejected_by_market_share, ids(&["b"]));
        assert_eq!(phase(&batch, "b"), PhaseStatus::RejectedByMarketShare);
        assert_eq!(conflict.winners, ids(&["a", "c", "d"]));
        assert_eq!(conflict.rejected_by_fee, ids(&["e"]));
        assert_eq!(conflict.status, ConflictStatus::Resolved);
        let e1_wins = conflict
            .winners
            .iter()
            .filter(|id| batch.get(id).unwrap().operator == "E1")
            .count();
        assert!(e1_wins <= 2);
    }

    #[test]
    fn test_incomplete_ranking_fails_without_changes() {
        let (catalog, mut conflict, mut batch) = open_pot_conflict(
            2,
            &[("a", "E1", 1000.0), ("b", "E1", 900.0), ("c", "E1", 800.0), ("d", "E2", 700.0)],
        );
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_fee_phase(&engine, &mut conflict, &mut batch);
        let before = conflict.clone();

        let missing = engine.apply(&mut conflict, &rankings(&[]), &mut batch);
        let partial = engine.apply(&mut conflict, &rankings(&[("E1", &["a", "b"])]), &mut batch);
        let duplicated = engine.apply(&mut conflict, &rankings(&[("E1", &["a", "a", "b"])]), &mut batch);

        for result in [missing, partial, duplicated] {
            assert!(matches!(result, Err(ArbitrationError::InvalidInput(_))));
        }
        assert_eq!(conflict, before);
        assert_eq!(phase(&batch, "a"), PhaseStatus::AwaitingFeeDecision);
    }

    #[test]
    fn test_slot_fee_comparison_has_no_quota() {
        let (catalog, mut conflict, mut batch) =
            open_slot_conflict(&[("a", "E1", 500.0), ("b", "E1", 500.0), ("c", "E1", 100.0)]);
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_fee_phase(&engine, &mut conflict, &mut batch);

        engine.apply(&mut conflict, &rankings(&[]), &mut batch).unwrap();

        assert_eq!(conflict.status, ConflictStatus::InHighestPrice);
        assert!(conflict.rejected_by_market_share.is_empty());
        assert_eq!(
            batch.get("a").unwrap().assignments[0].status.to_string(),
            "wartet_hoechstpreis_slot"
        );
        assert_eq!(phase(&batch, "c"), PhaseStatus::RejectedByFee);
    }

    #[test]
    fn test_unique_top_fee_wins_slot_outright() {
        let (catalog, mut conflict, mut batch) =
            open_slot_conflict(&[("a", "E1", 800.0), ("b", "E2", 500.0), ("c", "E3", 500.0)]);
        let actor = UserContext::system();
        let engine = ResolutionEngine::new(&catalog, &actor, Utc::now());
        to_fee_phase(&engine, &mut conflict, &mut batch);

        engine.apply(&mut conflict, &rankings(&[]), &mut batch).unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.winners, ids(&["a"]));
        assert_eq!(conflict.rejected_by_fee, ids(&["b", "c"]));
        assert_eq!(
            batch.get("a").unwrap().assignments[0].status,
            AssignmentStatus::Slot(PhaseStatus::ConfirmedByFee)
        );
        assert_eq!(
            batch.get("b").unwrap().assignments[0].status,
            AssignmentStatus::Slot(PhaseStatus::RejectedByFee)
        );
    }
}
