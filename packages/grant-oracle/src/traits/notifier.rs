//! Hand-off of grant events to a delivery channel.

use async_trait::async_trait;
use tracing::info;

use crate::error::NotifyError;
use crate::types::GrantEvent;

/// Accepts plain events. Delivery semantics belong to the implementor.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &GrantEvent) -> Result<(), NotifyError>;
}

/// Notifier that writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &GrantEvent) -> Result<(), NotifyError> {
        match event {
            GrantEvent::NewRecord(record) => info!(
                id = %record.id,
                title = %record.title(),
                confidence = record.confidence,
                "New grant record"
            ),
            GrantEvent::StatusChanged {
                id,
                title,
                from,
                to,
                reason,
            } => info!(
                id = %id,
                title = %title,
                from = %from,
                to = %to,
                reason = reason.as_deref().unwrap_or(""),
                "Grant status changed"
            ),
            GrantEvent::BatchSummary(report) => info!(
                succeeded = report.tasks_succeeded,
                failed = report.tasks_failed,
                candidates = report.candidates_found,
                new_records = report.new_records,
                cancelled = report.cancelled,
                "Discovery run finished"
            ),
        }
        Ok(())
    }
}
