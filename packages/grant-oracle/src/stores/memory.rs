//! In-memory record store for tests, the CLI, and development.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{RecordStore, UpsertOutcome};
use crate::types::{GrantStatus, VettedRecord};

/// Vetted records held in a map keyed by id.
///
/// Data is lost on restart. Iteration order is by id, so listings are
/// stable.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, VettedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records(records: impl IntoIterator<Item = VettedRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }

    /// Every stored record.
    pub fn all(&self) -> StoreResult<Vec<VettedRecord>> {
        Ok(self.read()?.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, VettedRecord>>> {
        self.records.read().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("memory store lock poisoned".into())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, record: &VettedRecord) -> StoreResult<UpsertOutcome> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let outcome = match records.insert(record.id.clone(), record.clone()) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<VettedRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn fetch_by_status(&self, status: GrantStatus) -> StoreResult<Vec<VettedRecord>> {
        Ok(self
            .read()?
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateRecord;

    fn record(title: &str) -> VettedRecord {
        VettedRecord::from_candidate(CandidateRecord::new(title, "https://x.gov.in"))
    }

    #[tokio::test]
    async fn test_upsert_reports_insert_then_update() {
        let store = MemoryStore::new();
        let r = record("Seed Fund");

        assert_eq!(store.upsert(&r).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&r).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&r.id).await.unwrap().unwrap().title(), "Seed Fund");
    }

    #[tokio::test]
    async fn test_fetch_by_status() {
        let live = record("Seed Fund");
        let mut expired = record("Old Challenge");
        expired.status = GrantStatus::Expired;

        let store = MemoryStore::with_records([live.clone(), expired]);
        let found = store.fetch_by_status(GrantStatus::Live).await.unwrap();
        assert_eq!(found, vec![live]);
    }
}
