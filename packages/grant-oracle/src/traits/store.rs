//! Persistence for vetted records.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{GrantStatus, VettedRecord};

/// Whether an upsert created or replaced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Storage for vetted records, keyed by record id.
///
/// Records are never deleted; expired records are kept with their status.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record.
    async fn upsert(&self, record: &VettedRecord) -> StoreResult<UpsertOutcome>;

    /// Get a record by id.
    async fn get(&self, id: &str) -> StoreResult<Option<VettedRecord>>;

    /// All records with the given status.
    async fn fetch_by_status(&self, status: GrantStatus) -> StoreResult<Vec<VettedRecord>>;
}
