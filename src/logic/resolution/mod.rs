//! Three-phase resolution of a single conflict document.
//!
//! Phases run on an in-memory conflict plus a shared `RequestBatch`; nothing is
//! persisted here. A phase either applies completely or returns an error before
//! touching anything, so callers can drop the working set on failure.

mod fee_comparison;
mod highest_price;
mod renunciation;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::logic::error::{ArbitrationError, Result};
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{
    BidDecision, ConflictDocument, FeeDecision, Id, RenunciationDecision, ResolutionPhase, UserContext,
};
use crate::store::RequestBatch;

/// Caller-supplied input for one resolution phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Decision {
    Renunciation(RenunciationDecision),
    FeeComparison(FeeDecision),
    HighestPrice(BidDecision),
}

impl Decision {
    pub fn phase(&self) -> ResolutionPhase {
        match self {
            Decision::Renunciation(_) => ResolutionPhase::Renunciation,
            Decision::FeeComparison(_) => ResolutionPhase::FeeComparison,
            Decision::HighestPrice(_) => ResolutionPhase::HighestPrice,
        }
    }
}

pub struct ResolutionEngine<'a> {
    catalog: &'a CatalogSnapshot,
    actor: &'a UserContext,
    now: DateTime<Utc>,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(catalog: &'a CatalogSnapshot, actor: &'a UserContext, now: DateTime<Utc>) -> Self {
        Self { catalog, actor, now }
    }

    /// Apply the decision to the conflict, stamping the governed assignments in `batch`
    pub fn apply(&self, conflict: &mut ConflictDocument, decision: &Decision, batch: &mut RequestBatch) -> Result<()> {
        ensure_accepts(conflict, decision.phase())?;
        let scope = self.catalog.scope_for(conflict)?;
        match decision {
            Decision::Renunciation(d) => renunciation::apply(&scope, conflict, d, batch, self),
            Decision::FeeComparison(d) => fee_comparison::apply(&scope, conflict, d, batch, self),
            Decision::HighestPrice(d) => highest_price::apply(&scope, conflict, d, batch, self),
        }?;
        log::info!(
            "{} applied to conflict {} by {}, now {}",
            decision.phase(),
            conflict.id,
            self.actor.display_name(),
            conflict.status
        );
        Ok(())
    }

    fn note(&self, conflict: &mut ConflictDocument, text: &str) {
        conflict.append_note(&format!("{} ({})", text, self.actor.display_name()), self.now);
    }
}

pub fn ensure_accepts(conflict: &ConflictDocument, phase: ResolutionPhase) -> Result<()> {
    if conflict.status.accepts(phase) {
        return Ok(());
    }
    Err(ArbitrationError::PhaseNotAccepted {
        conflict_id: conflict.id.clone(),
        phase,
        status: conflict.status.to_string(),
    })
}

/// Outcome of walking a descending ranking in tie blocks
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Allocation {
    pub winners: Vec<Id>,
    /// Boundary block that did not fit completely
    pub tied: Vec<Id>,
    pub losers: Vec<Id>,
}

/// Sort descending (ids break ordering ties, not outcomes) and hand out `capacity`.
///
/// A block of equal values wins only as a whole. The first block that does not fit
/// while capacity remains is tied; every block after it loses.
pub(crate) fn allocate(mut candidates: Vec<(Id, f64)>, capacity: usize) -> Allocation {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut allocation = Allocation::default();
    let mut remaining = capacity;
    let mut cut = false;
    let blocks = candidates.into_iter().chunk_by(|(_, value)| *value);
    for (_, block) in &blocks {
        let ids: Vec<Id> = block.map(|(id, _)| id).collect();
        if cut || remaining == 0 {
            allocation.losers.extend(ids);
        } else if ids.len() <= remaining {
            remaining -= ids.len();
            allocation.winners.extend(ids);
        } else {
            allocation.tied.extend(ids);
            cut = true;
        }
    }
    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::test_support::ids;

    fn ranked(v: &[(&str, f64)]) -> Vec<(Id, f64)> {
        v.iter().map(|(id, value)| (id.to_string(), *value)).collect()
    }

    #[test]
    fn test_allocate_sends_boundary_tie_to_next_round() {
        let allocation = allocate(ranked(&[("d", 700.0), ("b", 900.0), ("a", 1000.0), ("c", 900.0)]), 2);
        assert_eq!(allocation.winners, ids(&["a"]));
        assert_eq!(allocation.tied, ids(&["b", "c"]));
        assert_eq!(allocation.losers, ids(&["d"]));
    }

    #[test]
    fn test_allocate_exact_fit_has_no_tie() {
        let allocation = allocate(ranked(&[("a", 10.0), ("b", 10.0), ("c", 5.0)]), 2);
        assert_eq!(allocation.winners, ids(&["a", "b"]));
        assert!(allocation.tied.is_empty());
        assert_eq!(allocation.losers, ids(&["c"]));
    }

    #[test]
    fn test_allocate_without_capacity_rejects_all() {
        let allocation = allocate(ranked(&[("a", 10.0), ("b", 9.0)]), 0);
        assert!(allocation.winners.is_empty());
        assert!(allocation.tied.is_empty());
        assert_eq!(allocation.losers, ids(&["a", "b"]));
    }

    #[test]
    fn test_decision_is_tagged_by_phase() {
        let decision: Decision = serde_json::from_value(serde_json::json!({
            "phase": "renunciation",
            "renouncing": ["a"]
        }))
        .unwrap();
        assert_eq!(decision.phase(), ResolutionPhase::Renunciation);
    }
}
