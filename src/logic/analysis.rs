//! Read-only analyses offered to coordinators while a group is being resolved
//!
//! Neighbour pots show where a pot conflict's requests could move in time, alternative
//! slots show which parent slots of the same pot are still free for a slot conflict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::logic::conflict_ops::{get_group, load_members};
use crate::logic::error::{ArbitrationError, Result};
use crate::logic::scope::ConflictScope;
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{CapacityPot, ConflictKind, ConflictTrigger, Id, Request, Slot};
use crate::store::{RequestStore, Store};

/// Occupancy of a pot adjacent in time to a conflicted pot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborPot {
    /// Conflicted pot this one neighbours
    pub source_pot_id: Id,
    pub pot_id: Id,
    pub time_window: String,
    pub max_capacity: usize,
    pub active_requests: usize,
    pub free_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeSlot {
    /// Conflicted slot this one could replace
    pub source_slot_id: Id,
    pub pot_id: Id,
    pub slot: Slot,
}

fn pot_occupancy(pot: &CapacityPot, requests: &BTreeMap<Id, Request>) -> usize {
    let scope = ConflictScope::for_pot(pot);
    pot.request_ids
        .iter()
        .filter_map(|id| requests.get(id))
        .filter(|r| scope.touches(r) && scope.is_pot_active(r))
        .count()
}

fn slot_is_taken(slot: &Slot, pot: &CapacityPot, requests: &BTreeMap<Id, Request>) -> bool {
    pot.request_ids
        .iter()
        .filter_map(|id| requests.get(id))
        .filter_map(|r| r.assignment(&slot.id))
        .any(|a| !a.status.is_rejected())
}

async fn requests_of<S: RequestStore + ?Sized>(store: &S, pots: &[&CapacityPot]) -> Result<BTreeMap<Id, Request>> {
    let mut ids: Vec<Id> = pots.iter().flat_map(|p| p.request_ids.iter().cloned()).collect();
    ids.sort();
    ids.dedup();
    Ok(store
        .get_requests(&ids)
        .await?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect())
}

/// Pots next to every pot of a POT group, with their current occupancy
pub fn neighbor_pots_in(
    catalog: &CatalogSnapshot,
    source_pot_ids: &[Id],
    requests: &BTreeMap<Id, Request>,
) -> Vec<NeighborPot> {
    let mut neighbors = Vec::new();
    for source in source_pot_ids.iter().filter_map(|id| catalog.pot(id)) {
        for candidate in catalog.sorted_pots() {
            if !candidate.is_neighbor_of(source) {
                continue;
            }
            let active = pot_occupancy(candidate, requests);
            neighbors.push(NeighborPot {
                source_pot_id: source.id.clone(),
                pot_id: candidate.id.clone(),
                time_window: candidate.time_window(),
                max_capacity: candidate.max_capacity,
                active_requests: active,
                free_capacity: candidate.max_capacity.saturating_sub(active),
            });
        }
    }
    neighbors
}

/// Other parent slots of the same pot that nobody holds
pub fn alternative_slots_in(
    catalog: &CatalogSnapshot,
    source_slot_ids: &[Id],
    requests: &BTreeMap<Id, Request>,
) -> Vec<AlternativeSlot> {
    let mut alternatives = Vec::new();
    for source in source_slot_ids.iter().filter_map(|id| catalog.slot(id)) {
        let Some(pot) = source.pot_id.as_ref().and_then(|id| catalog.pot(id)) else {
            continue;
        };
        let mut slot_ids = pot.slot_ids.clone();
        slot_ids.sort();
        for slot in slot_ids.iter().filter_map(|id| catalog.slot(id)) {
            if slot.id == source.id || !slot.is_parent() || slot_is_taken(slot, pot, requests) {
                continue;
            }
            alternatives.push(AlternativeSlot {
                source_slot_id: source.id.clone(),
                pot_id: pot.id.clone(),
                slot: slot.clone(),
            });
        }
    }
    alternatives
}

async fn group_resources<S: Store + ?Sized>(store: &S, group_id: &Id, expected: ConflictKind) -> Result<Vec<Id>> {
    let group = get_group(store, group_id).await?;
    if group.conflict_kind != expected {
        return Err(ArbitrationError::Precondition(format!(
            "group {} holds {} conflicts, analysis needs {}",
            group.id, group.conflict_kind, expected
        )));
    }
    let mut resources: Vec<Id> = load_members(store, &group)
        .await?
        .into_iter()
        .map(|c| match c.trigger {
            ConflictTrigger::Pot { triggering_pot } => triggering_pot,
            ConflictTrigger::Slot { triggering_slot } => triggering_slot,
        })
        .collect();
    resources.sort();
    resources.dedup();
    Ok(resources)
}

pub async fn neighbor_pots<S: Store + ?Sized>(store: &S, group_id: &Id) -> Result<Vec<NeighborPot>> {
    let pot_ids = group_resources(store, group_id, ConflictKind::Pot).await?;
    let catalog = CatalogSnapshot::load(store).await?;
    let neighbours: Vec<&CapacityPot> = catalog
        .sorted_pots()
        .into_iter()
        .filter(|candidate| {
            pot_ids
                .iter()
                .filter_map(|id| catalog.pot(id))
                .any(|source| candidate.is_neighbor_of(source))
        })
        .collect();
    let requests = requests_of(store, &neighbours).await?;
    Ok(neighbor_pots_in(&catalog, &pot_ids, &requests))
}

pub async fn alternative_slots<S: Store + ?Sized>(store: &S, group_id: &Id) -> Result<Vec<AlternativeSlot>> {
    let slot_ids = group_resources(store, group_id, ConflictKind::Slot).await?;
    let catalog = CatalogSnapshot::load(store).await?;
    let pots: Vec<&CapacityPot> = slot_ids
        .iter()
        .filter_map(|id| catalog.slot(id))
        .filter_map(|s| s.pot_id.as_ref().and_then(|p| catalog.pot(p)))
        .collect();
    let requests = requests_of(store, &pots).await?;
    Ok(alternative_slots_in(&catalog, &slot_ids, &requests))
}
