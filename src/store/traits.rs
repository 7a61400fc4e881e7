use crate::model::{CapacityPot, ConflictDocument, ConflictGroup, ConflictKind, Id, Request, Slot};
use anyhow::Result;

#[async_trait::async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_request(&self, id: &Id) -> Result<Option<Request>>;
    /// Requests for the given ids; unknown ids are skipped
    async fn get_requests(&self, ids: &[Id]) -> Result<Vec<Request>>;
    async fn upsert_request(&self, request: Request) -> Result<()>;
}

/// Slot and pot catalog maintained by the catalog collaborator
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_slot(&self, id: &Id) -> Result<Option<Slot>>;
    async fn list_slots(&self) -> Result<Vec<Slot>>;
    async fn upsert_slot(&self, slot: Slot) -> Result<()>;
    async fn get_pot(&self, id: &Id) -> Result<Option<CapacityPot>>;
    async fn list_pots(&self) -> Result<Vec<CapacityPot>>;
    async fn upsert_pot(&self, pot: CapacityPot) -> Result<()>;
}

#[async_trait::async_trait]
pub trait ConflictStore: Send + Sync {
    async fn get_conflict(&self, id: &Id) -> Result<Option<ConflictDocument>>;
    /// All conflicts, optionally restricted to one kind, oldest first
    async fn list_conflicts(&self, kind: Option<ConflictKind>) -> Result<Vec<ConflictDocument>>;
    async fn upsert_conflict(&self, conflict: ConflictDocument) -> Result<()>;
}

#[async_trait::async_trait]
pub trait GroupStore: Send + Sync {
    async fn get_group(&self, id: &Id) -> Result<Option<ConflictGroup>>;
    async fn list_groups(&self) -> Result<Vec<ConflictGroup>>;
    async fn upsert_group(&self, group: ConflictGroup) -> Result<()>;
    async fn delete_group(&self, id: &Id) -> Result<bool>;
}

pub trait Store: RequestStore + CatalogStore + ConflictStore + GroupStore + Send + Sync {}
impl<T: RequestStore + CatalogStore + ConflictStore + GroupStore + Send + Sync> Store for T {}
