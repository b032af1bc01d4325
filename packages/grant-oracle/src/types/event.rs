//! Events emitted to the notification collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{GrantStatus, VettedRecord};

/// Counts describing one oracle run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    /// (target, reason kind) for every failed task
    pub failures: Vec<(String, String)>,
    pub candidates_found: usize,
    pub records_vetted: usize,
    pub duplicates_found: usize,
    pub new_records: usize,
    pub store_errors: usize,
    pub cancelled: bool,
}

/// Plain event handed to the notifier; delivery is not our concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum GrantEvent {
    /// A non-duplicate record was stored for the first time
    NewRecord(Box<VettedRecord>),

    /// A stored record changed status
    StatusChanged {
        id: String,
        title: String,
        from: GrantStatus,
        to: GrantStatus,
        reason: Option<String>,
    },

    /// End-of-run summary
    BatchSummary(RunReport),
}

impl GrantEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewRecord(_) => "new_record",
            Self::StatusChanged { .. } => "status_changed",
            Self::BatchSummary(_) => "batch_summary",
        }
    }
}
