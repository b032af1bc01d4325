//! End-to-end runs: discovery, vetting, storage and notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::discovery::{BatchSummary, DiscoveryOrchestrator};
use crate::quality::{QualityOutput, QualityPipeline, QualityRequest, StatusReport};
use crate::traits::{Notifier, RecordStore, UpsertOutcome};
use crate::types::{
    DiscoveryTask, GrantEvent, GrantStatus, RequesterProfile, RunReport, VettedRecord,
};

/// Everything a discovery run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryRun {
    pub report: RunReport,
    pub batch: BatchSummary,
    pub quality: QualityOutput,
}

/// Result of a status refresh over stored records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub status: StatusReport,
    pub records_updated: usize,
    pub store_errors: usize,
}

/// Wires discovery and the quality pipeline to storage and notification.
///
/// Store and notifier failures are logged and counted; they never abort a
/// run.
pub struct GrantOracle {
    orchestrator: DiscoveryOrchestrator,
    pipeline: QualityPipeline,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl GrantOracle {
    pub fn new(
        orchestrator: DiscoveryOrchestrator,
        pipeline: QualityPipeline,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orchestrator,
            pipeline,
            store,
            notifier,
        }
    }

    pub fn orchestrator(&self) -> &DiscoveryOrchestrator {
        &self.orchestrator
    }

    pub fn pipeline(&self) -> &QualityPipeline {
        &self.pipeline
    }

    /// Discover, vet and store grants for a batch of tasks.
    pub async fn run_discovery(
        &self,
        tasks: Vec<DiscoveryTask>,
        profile: Option<RequesterProfile>,
        cancel: &CancellationToken,
    ) -> DiscoveryRun {
        let mut report = RunReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let batch = self.orchestrator.run_batch(tasks, cancel).await;
        report.tasks_succeeded = batch.succeeded.len();
        report.tasks_failed = batch.failed.len();
        report.failures = batch
            .failed
            .iter()
            .map(|f| (f.target.to_string(), f.kind.to_string()))
            .collect();
        report.candidates_found = batch.candidate_count();
        report.cancelled = batch.cancelled;

        let existing = match self.store.fetch_by_status(GrantStatus::Live).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not load stored records; deduplicating batch only");
                report.store_errors += 1;
                Vec::new()
            }
        };

        let request = QualityRequest::new(batch.candidates())
            .with_existing(existing)
            .with_profile(profile);
        let quality = self.pipeline.run(request, Utc::now()).await;
        report.records_vetted = quality.records.len();
        report.duplicates_found = quality.dedup_report.duplicates_found;

        for record in &quality.records {
            match self.store.upsert(record).await {
                Ok(UpsertOutcome::Inserted) if !record.is_duplicate => {
                    report.new_records += 1;
                    self.emit(GrantEvent::NewRecord(Box::new(record.clone())))
                        .await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Failed to store record");
                    report.store_errors += 1;
                }
            }
        }
        for record in &quality.updated_existing {
            if let Err(e) = self.store.upsert(record).await {
                warn!(record_id = %record.id, error = %e, "Failed to update stored record");
                report.store_errors += 1;
            }
        }

        report.finished_at = Some(Utc::now());
        info!(
            succeeded = report.tasks_succeeded,
            failed = report.tasks_failed,
            candidates = report.candidates_found,
            vetted = report.records_vetted,
            duplicates = report.duplicates_found,
            new_records = report.new_records,
            store_errors = report.store_errors,
            cancelled = report.cancelled,
            "Discovery run complete"
        );
        self.emit(GrantEvent::BatchSummary(report.clone())).await;

        DiscoveryRun {
            report,
            batch,
            quality,
        }
    }

    /// Re-check live stored records that are due, persisting the results.
    pub async fn refresh_statuses(&self, now: DateTime<Utc>) -> RefreshReport {
        let mut refresh = RefreshReport::default();

        let mut records = match self.store.fetch_by_status(GrantStatus::Live).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not load live records for status refresh");
                refresh.store_errors += 1;
                return refresh;
            }
        };

        let monitor = self.pipeline.status_monitor();
        refresh.status = monitor
            .check(
                records.iter_mut().filter(|r| !r.is_duplicate),
                self.pipeline.prober(),
                now,
            )
            .await;

        let checked: Vec<&VettedRecord> = records
            .iter()
            .filter(|r| r.last_checked == Some(now))
            .collect();
        for record in checked {
            match self.store.upsert(record).await {
                Ok(_) => refresh.records_updated += 1,
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Failed to store status update");
                    refresh.store_errors += 1;
                }
            }
        }

        for change in &refresh.status.changes {
            self.emit(GrantEvent::StatusChanged {
                id: change.id.clone(),
                title: change.title.clone(),
                from: change.from,
                to: change.to,
                reason: change.reason.clone(),
            })
            .await;
        }

        info!(
            checked = refresh.status.checked,
            changes = refresh.status.changes.len(),
            store_errors = refresh.store_errors,
            "Status refresh complete"
        );
        refresh
    }

    async fn emit(&self, event: GrantEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(kind = event.kind(), error = %e, "Failed to deliver event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backends::{BackendAdapter, FallbackController};
    use crate::session::SessionLifecycleManager;
    use crate::stores::MemoryStore;
    use crate::testing::{FailingStore, MockBackend, MockFetcher, MockProber, RecordingNotifier};
    use crate::types::CandidateRecord;

    const SEED_FUND: &str =
        r#"{"grants":[{"title":"Seed Fund","agency":"DPIIT","typical_ticket_lakh":60}]}"#;

    fn oracle(
        backend: MockBackend,
        prober: MockProber,
        store: Arc<dyn RecordStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> GrantOracle {
        let controller = FallbackController::new(vec![Arc::new(backend) as Arc<dyn BackendAdapter>]);
        let sessions = SessionLifecycleManager::new(
            Arc::new(controller),
            Arc::new(MockFetcher::new().with_default_page("grant page")),
        );
        GrantOracle::new(
            DiscoveryOrchestrator::new(sessions).with_inter_task_delay(Duration::ZERO),
            QualityPipeline::new(Arc::new(prober)),
            store,
            notifier,
        )
    }

    #[tokio::test]
    async fn test_new_records_are_stored_and_announced() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle = oracle(
            MockBackend::new("openai").replying(SEED_FUND),
            MockProber::new(),
            store.clone(),
            notifier.clone(),
        );

        let run = oracle
            .run_discovery(
                vec![DiscoveryTask::discover("https://seedfund.startupindia.gov.in")],
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(run.report.tasks_succeeded, 1);
        assert_eq!(run.report.new_records, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(notifier.events_of_kind("new_record").len(), 1);
        assert_eq!(notifier.events_of_kind("batch_summary").len(), 1);
    }

    #[tokio::test]
    async fn test_rediscovery_is_not_announced_again() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle = oracle(
            MockBackend::new("openai").replying(SEED_FUND),
            MockProber::new(),
            store.clone(),
            notifier.clone(),
        );
        let task = || vec![DiscoveryTask::discover("https://seedfund.startupindia.gov.in")];

        oracle.run_discovery(task(), None, &CancellationToken::new()).await;
        let second = oracle.run_discovery(task(), None, &CancellationToken::new()).await;

        assert_eq!(second.report.new_records, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(notifier.events_of_kind("new_record").len(), 1);
    }

    #[tokio::test]
    async fn test_store_and_notifier_failures_do_not_abort() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let oracle = oracle(
            MockBackend::new("openai").replying(SEED_FUND),
            MockProber::new(),
            Arc::new(FailingStore),
            notifier.clone(),
        );

        let run = oracle
            .run_discovery(
                vec![DiscoveryTask::discover("https://a.gov.in")],
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(run.report.tasks_succeeded, 1);
        // One failed load, one failed upsert.
        assert_eq!(run.report.store_errors, 2);
        assert_eq!(run.quality.records.len(), 1);
        assert_eq!(notifier.events_of_kind("batch_summary").len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_emits_status_changes() {
        let now = Utc::now();
        let mut stale = VettedRecord::from_candidate(CandidateRecord::new(
            "Closed Call",
            "https://closed.gov.in",
        ));
        stale.last_checked = Some(now - chrono::Duration::days(3));
        let fresh = {
            let mut r = VettedRecord::from_candidate(CandidateRecord::new(
                "Fresh Call",
                "https://fresh.gov.in",
            ));
            r.last_checked = Some(now - chrono::Duration::hours(1));
            r
        };
        let store = Arc::new(MemoryStore::with_records([stale.clone(), fresh]));
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle = oracle(
            MockBackend::new("openai"),
            MockProber::new().with_content("https://closed.gov.in", "Applications closed"),
            store.clone(),
            notifier.clone(),
        );

        let refresh = oracle.refresh_statuses(now).await;

        assert_eq!(refresh.status.checked, 1);
        assert_eq!(refresh.records_updated, 1);
        let stored = store.get(&stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GrantStatus::Expired);
        assert_eq!(stored.last_checked, Some(now));

        let events = notifier.events_of_kind("status_changed");
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            GrantEvent::StatusChanged { to: GrantStatus::Expired, .. }
        ));
    }
}
