use std::collections::HashMap;

use crate::logic::error::{ArbitrationError, Result};
use crate::logic::scope::ConflictScope;
use crate::model::{CapacityPot, ConflictDocument, ConflictTrigger, Id, Slot};
use crate::store::traits::CatalogStore;

/// Slot and pot catalog read once per detection pass or resolution action
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub pots: HashMap<Id, CapacityPot>,
    pub slots: HashMap<Id, Slot>,
}

impl CatalogSnapshot {
    pub async fn load<S: CatalogStore + ?Sized>(store: &S) -> Result<Self> {
        let pots = store.list_pots().await?;
        let slots = store.list_slots().await?;
        Ok(Self::from_parts(pots, slots))
    }

    pub fn from_parts(pots: Vec<CapacityPot>, slots: Vec<Slot>) -> Self {
        Self {
            pots: pots.into_iter().map(|p| (p.id.clone(), p)).collect(),
            slots: slots.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn pot(&self, id: &str) -> Option<&CapacityPot> {
        self.pots.get(id)
    }

    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.get(id)
    }

    /// Pots in id order, so passes are reproducible
    pub fn sorted_pots(&self) -> Vec<&CapacityPot> {
        let mut pots: Vec<&CapacityPot> = self.pots.values().collect();
        pots.sort_by(|a, b| a.id.cmp(&b.id));
        pots
    }

    pub fn sorted_parent_slots(&self) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self.slots.values().filter(|s| s.is_parent()).collect();
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        slots
    }

    /// Scope of an existing conflict; a dangling trigger is an integrity violation
    pub fn scope_for(&self, conflict: &ConflictDocument) -> Result<ConflictScope> {
        match &conflict.trigger {
            ConflictTrigger::Pot { triggering_pot } => self
                .pot(triggering_pot)
                .map(ConflictScope::for_pot)
                .ok_or_else(|| {
                    ArbitrationError::DataIntegrity(format!(
                        "conflict {} references unknown capacity pot {}",
                        conflict.id, triggering_pot
                    ))
                }),
            ConflictTrigger::Slot { triggering_slot } => self
                .slot(triggering_slot)
                .map(ConflictScope::for_slot)
                .ok_or_else(|| {
                    ArbitrationError::DataIntegrity(format!(
                        "conflict {} references unknown slot {}",
                        conflict.id, triggering_slot
                    ))
                }),
        }
    }
}
