//! In-memory store for tests, demos and single-process deployments

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CapacityPot, ConflictDocument, ConflictGroup, ConflictKind, Id, Request, Slot};
use crate::store::traits::{CatalogStore, ConflictStore, GroupStore, RequestStore};

#[derive(Debug, Default)]
struct Tables {
    requests: HashMap<Id, Request>,
    slots: HashMap<Id, Slot>,
    pots: HashMap<Id, CapacityPot>,
    conflicts: HashMap<Id, ConflictDocument>,
    groups: HashMap<Id, ConflictGroup>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RequestStore for MemoryStore {
    async fn get_request(&self, id: &Id) -> Result<Option<Request>> {
        Ok(self.tables.read().requests.get(id).cloned())
    }

    async fn get_requests(&self, ids: &[Id]) -> Result<Vec<Request>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.requests.get(id).cloned())
            .collect())
    }

    async fn upsert_request(&self, request: Request) -> Result<()> {
        self.tables
            .write()
            .requests
            .insert(request.id.clone(), request);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn get_slot(&self, id: &Id) -> Result<Option<Slot>> {
        Ok(self.tables.read().slots.get(id).cloned())
    }

    async fn list_slots(&self) -> Result<Vec<Slot>> {
        let mut slots: Vec<Slot> = self.tables.read().slots.values().cloned().collect();
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(slots)
    }

    async fn upsert_slot(&self, slot: Slot) -> Result<()> {
        self.tables.write().slots.insert(slot.id.clone(), slot);
        Ok(())
    }

    async fn get_pot(&self, id: &Id) -> Result<Option<CapacityPot>> {
        Ok(self.tables.read().pots.get(id).cloned())
    }

    async fn list_pots(&self) -> Result<Vec<CapacityPot>> {
        let mut pots: Vec<CapacityPot> = self.tables.read().pots.values().cloned().collect();
        pots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pots)
    }

    async fn upsert_pot(&self, pot: CapacityPot) -> Result<()> {
        self.tables.write().pots.insert(pot.id.clone(), pot);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConflictStore for MemoryStore {
    async fn get_conflict(&self, id: &Id) -> Result<Option<ConflictDocument>> {
        Ok(self.tables.read().conflicts.get(id).cloned())
    }

    async fn list_conflicts(&self, kind: Option<ConflictKind>) -> Result<Vec<ConflictDocument>> {
        let mut conflicts: Vec<ConflictDocument> = self
            .tables
            .read()
            .conflicts
            .values()
            .filter(|c| kind.map_or(true, |k| c.kind() == k))
            .cloned()
            .collect();
        conflicts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(conflicts)
    }

    async fn upsert_conflict(&self, conflict: ConflictDocument) -> Result<()> {
        self.tables
            .write()
            .conflicts
            .insert(conflict.id.clone(), conflict);
        Ok(())
    }
}

#[async_trait::async_trait]
impl GroupStore for MemoryStore {
    async fn get_group(&self, id: &Id) -> Result<Option<ConflictGroup>> {
        Ok(self.tables.read().groups.get(id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<ConflictGroup>> {
        let mut groups: Vec<ConflictGroup> = self.tables.read().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(groups)
    }

    async fn upsert_group(&self, group: ConflictGroup) -> Result<()> {
        self.tables.write().groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn delete_group(&self, id: &Id) -> Result<bool> {
        Ok(self.tables.write().groups.remove(id).is_some())
    }
}
