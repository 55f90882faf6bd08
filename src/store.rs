//! Backing store seam.
//!
//! The service only talks to [`ChemicalStore`]. [`MemoryStore`] keeps records
//! in process and evaluates filters itself; with the `mongo` feature,
//! [`MongoStore`](crate::MongoStore) hands them to MongoDB.

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::query::{FilterExpr, Matcher};
use crate::types::{Chemical, ChemicalPatch, NewChemical};

/// Persistence operations on the chemicals collection.
///
/// Records come back in insertion order. Isolation and write ordering are
/// whatever the implementation provides.
#[async_trait]
pub trait ChemicalStore: std::fmt::Debug + Send + Sync {
    /// Records matching `filter` (all if `None`), skipping `skip` and
    /// returning at most `limit`.
    async fn find(
        &self,
        filter: Option<&FilterExpr>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Chemical>, StoreError>;

    /// Number of records matching `filter`, ignoring paging.
    async fn count(&self, filter: Option<&FilterExpr>) -> Result<u64, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Chemical>, StoreError>;

    /// Persist a new record, assigning its id and timestamps.
    async fn insert(&self, new: NewChemical) -> Result<Chemical, StoreError>;

    /// Apply a partial update. Returns `None` if the id is unknown.
    async fn update(&self, id: &str, patch: ChemicalPatch)
        -> Result<Option<Chemical>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove every record, returning how many were removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<IndexMap<String, Chemical>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with records, e.g. from a seed file.
    ///
    /// Records are stored as given; callers validate them first (see
    /// [`load_seed`](crate::load_seed)).
    pub fn with_records(records: impl IntoIterator<Item = NewChemical>) -> Self {
        let now = Utc::now();
        let records = records
            .into_iter()
            .map(|new| {
                let id = new_id();
                (id.clone(), Chemical::from_new(id, new, now))
            })
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn matches(matcher: Option<&Matcher<'_>>, chemical: &Chemical) -> bool {
    matcher.map_or(true, |m| m.matches(&chemical.to_document()))
}

#[async_trait]
impl ChemicalStore for MemoryStore {
    async fn find(
        &self,
        filter: Option<&FilterExpr>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Chemical>, StoreError> {
        let matcher = filter.map(FilterExpr::matcher);
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|chemical| matches(matcher.as_ref(), chemical))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: Option<&FilterExpr>) -> Result<u64, StoreError> {
        let matcher = filter.map(FilterExpr::matcher);
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|chemical| matches(matcher.as_ref(), chemical))
            .count() as u64)
    }

    async fn get(&self, id: &str) -> Result<Option<Chemical>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn insert(&self, new: NewChemical) -> Result<Chemical, StoreError> {
        let id = new_id();
        let chemical = Chemical::from_new(id.clone(), new, Utc::now());
        self.records.write().insert(id, chemical.clone());
        Ok(chemical)
    }

    async fn update(
        &self,
        id: &str,
        patch: ChemicalPatch,
    ) -> Result<Option<Chemical>, StoreError> {
        let mut records = self.records.write();
        Ok(records.get_mut(id).map(|chemical| {
            chemical.apply(patch, Utc::now());
            chemical.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().shift_remove(id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut records = self.records.write();
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
