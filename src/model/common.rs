use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Derive a stable id from a grouping key so the same key always maps to the same record
pub fn deterministic_id(prefix: &str, key: &str) -> Id {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}-{}", prefix, &hex::encode(digest)[..24])
}

/// Sort and dedupe a list of ids, the canonical form used for participant comparisons
pub fn sorted_ids<'a, I>(ids: I) -> Vec<Id>
where
    I: IntoIterator<Item = &'a Id>,
{
    let mut ids: Vec<Id> = ids.into_iter().cloned().collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Offset/limit paging shared by the list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl Page {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }

    /// Page through already filtered items, keeping the total for the caller
    pub fn paged<T>(&self, items: Vec<T>) -> Paged<T> {
        Paged {
            total: items.len(),
            offset: self.offset,
            limit: self.limit,
            items: self.apply(items),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub items: Vec<T>,
}
