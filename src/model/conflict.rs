use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_id, sorted_ids, ConflictKind, ConflictStatus, Id};

/// Resource whose overbooking opened the conflict
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "conflict_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictTrigger {
    Pot { triggering_pot: Id },
    Slot { triggering_slot: Id },
}

impl ConflictTrigger {
    pub fn kind(&self) -> ConflictKind {
        match self {
            ConflictTrigger::Pot { .. } => ConflictKind::Pot,
            ConflictTrigger::Slot { .. } => ConflictKind::Slot,
        }
    }

    pub fn resource_id(&self) -> &Id {
        match self {
            ConflictTrigger::Pot { triggering_pot } => triggering_pot,
            ConflictTrigger::Slot { triggering_slot } => triggering_slot,
        }
    }
}

/// Entry of the computed fee ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRankingEntry {
    pub request_id: Id,
    pub operator: String,
    pub fee: f64,
    /// Equal fees share a rank
    pub rank: usize,
}

/// Bid recorded during a highest-price round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedBid {
    pub request_id: Id,
    pub amount: Option<f64>,
    pub round: u32,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferralEntry {
    pub request_id: Id,
    /// Opaque detail supplied by the coordinator
    #[serde(default)]
    pub details: serde_json::Value,
}

/// One arbitration case for an overbooked pot or slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDocument {
    pub id: Id,
    #[serde(flatten)]
    pub trigger: ConflictTrigger,
    pub status: ConflictStatus,
    /// Participant set frozen at creation or last reset
    pub participants: Vec<Id>,
    #[serde(default)]
    pub renounced: Vec<Id>,
    #[serde(default)]
    pub deferred: Vec<DeferralEntry>,
    #[serde(default)]
    pub rejected_by_fee: Vec<Id>,
    #[serde(default)]
    pub rejected_by_market_share: Vec<Id>,
    #[serde(default)]
    pub rejected_by_highest_price: Vec<Id>,
    #[serde(default)]
    pub winners: Vec<Id>,
    #[serde(default)]
    pub fee_ranking: Vec<FeeRankingEntry>,
    #[serde(default)]
    pub bids: Vec<RecordedBid>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl ConflictDocument {
    pub fn open(trigger: ConflictTrigger, participants: &[Id], now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            trigger,
            status: ConflictStatus::Open,
            participants: sorted_ids(participants),
            renounced: Vec::new(),
            deferred: Vec::new(),
            rejected_by_fee: Vec::new(),
            rejected_by_market_share: Vec::new(),
            rejected_by_highest_price: Vec::new(),
            winners: Vec::new(),
            fee_ranking: Vec::new(),
            bids: Vec::new(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn kind(&self) -> ConflictKind {
        self.trigger.kind()
    }

    /// Unordered comparison against a freshly read participant set
    pub fn has_participants(&self, current: &[Id]) -> bool {
        sorted_ids(&self.participants) == sorted_ids(current)
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ConflictStatus::Resolved
    }

    pub fn deferred_ids(&self) -> Vec<Id> {
        self.deferred.iter().map(|d| d.request_id.clone()).collect()
    }

    /// Clear everything later phases wrote
    pub fn clear_after_renunciation(&mut self) {
        self.rejected_by_fee.clear();
        self.rejected_by_market_share.clear();
        self.rejected_by_highest_price.clear();
        self.fee_ranking.clear();
        self.bids.clear();
    }

    /// Start over with a new participant set
    pub fn reset(&mut self, participants: &[Id], note: &str, now: DateTime<Utc>) {
        self.participants = sorted_ids(participants);
        self.renounced.clear();
        self.deferred.clear();
        self.winners.clear();
        self.clear_after_renunciation();
        self.status = ConflictStatus::Open;
        self.closed_at = None;
        self.append_note(note, now);
    }

    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = ConflictStatus::Resolved;
        self.closed_at = Some(now);
        self.updated_at = now;
    }

    pub fn append_note(&mut self, note: &str, now: DateTime<Utc>) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes
            .push_str(&format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S"), note));
        self.updated_at = now;
    }

    /// Every participant decided, counting each phase's outcome exactly once
    pub fn decided_count(&self) -> usize {
        self.winners.len()
            + self.renounced.len()
            + self.deferred.len()
            + self.rejected_by_fee.len()
            + self.rejected_by_market_share.len()
            + self.rejected_by_highest_price.len()
    }
}

/// Phase 1 input: who steps back from this round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenunciationDecision {
    #[serde(default)]
    pub renouncing: Vec<Id>,
    #[serde(default)]
    pub deferring: Vec<DeferralEntry>,
}

/// Priority order an operator supplies for its own requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRanking {
    pub operator: String,
    pub request_ids: Vec<Id>,
}

/// Phase 2 input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeDecision {
    #[serde(default)]
    pub operator_rankings: Vec<OperatorRanking>,
}

impl FeeDecision {
    pub fn ranking_for(&self, operator: &str) -> Option<&OperatorRanking> {
        self.operator_rankings.iter().find(|r| r.operator == operator)
    }
}

/// Bid amount as submitted; anything that is not a number is kept so it can be rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BidAmount {
    Number(f64),
    Malformed(serde_json::Value),
}

impl BidAmount {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            BidAmount::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub request_id: Id,
    pub amount: BidAmount,
}

/// Phase 3 input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidDecision {
    #[serde(default)]
    pub bids: Vec<Bid>,
}
