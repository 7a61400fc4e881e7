use anyhow::Result;
use std::collections::HashMap;

use crate::model::{Id, Request};
use crate::store::traits::RequestStore;

#[derive(Clone, Debug)]
struct BatchEntry {
    /// State as loaded, used to detect whether the request needs writing
    original: Request,
    request: Request,
}

impl BatchEntry {
    fn is_dirty(&self) -> bool {
        self.request.assignments != self.original.assignments
            || self.request.status != self.original.status
    }
}

/// Id-keyed working set of requests touched by one detection pass or resolution action.
///
/// Every mutation goes through the same entry, so a request touched by several
/// conflicts is written once. `commit` consumes the batch: the aggregate status of
/// every changed request is recomputed and each one is persisted exactly once.
#[derive(Debug, Default)]
pub struct RequestBatch {
    entries: HashMap<Id, BatchEntry>,
}

impl RequestBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_requests<I>(requests: I) -> Self
    where
        I: IntoIterator<Item = Request>,
    {
        let mut batch = Self::new();
        batch.insert_all(requests);
        batch
    }

    /// Load the given requests from the store, ignoring ids already in the batch
    pub async fn load_missing<S: RequestStore + ?Sized>(&mut self, store: &S, ids: &[Id]) -> Result<()> {
        let missing: Vec<Id> = ids
            .iter()
            .filter(|id| !self.entries.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let loaded = store.get_requests(&missing).await?;
        if loaded.len() < missing.len() {
            log::warn!(
                "{} of {} referenced requests not found in store",
                missing.len() - loaded.len(),
                missing.len()
            );
        }
        self.insert_all(loaded);
        Ok(())
    }

    fn insert_all<I>(&mut self, requests: I)
    where
        I: IntoIterator<Item = Request>,
    {
        for request in requests {
            self.entries.entry(request.id.clone()).or_insert(BatchEntry {
                original: request.clone(),
                request,
            });
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Request> {
        self.entries.get(id).map(|e| &e.request)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Request> {
        self.entries.get_mut(id).map(|e| &mut e.request)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dirty_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_dirty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Persist every changed request once, after recomputing its aggregate status
    pub async fn commit<S: RequestStore + ?Sized>(self, store: &S) -> Result<Vec<Request>> {
        let mut written = Vec::new();
        let mut entries: Vec<BatchEntry> = self.entries.into_values().collect();
        entries.sort_by(|a, b| a.request.id.cmp(&b.request.id));

        for mut entry in entries {
            if !entry.is_dirty() {
                continue;
            }
            entry.request.recompute_status();
            store.upsert_request(entry.request.clone()).await?;
            written.push(entry.request);
        }

        log::debug!("Committed {} request updates", written.len());
        Ok(written)
    }
}
