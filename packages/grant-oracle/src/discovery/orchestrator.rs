//! Sequential batch execution of discovery tasks.
//!
//! Tasks run one at a time with a delay between them. Concurrent sessions
//! against one provider only multiply rate-limit failures, and discovery
//! runs are periodic, so throughput is not a concern.

use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{TaskError, TaskResult};
use crate::session::SessionLifecycleManager;
use crate::types::{CandidateRecord, DiscoveryTask, TaskTarget};

/// Pause between consecutive tasks of a batch.
pub const DEFAULT_INTER_TASK_DELAY: Duration = Duration::from_secs(5);

/// A task that produced candidates (possibly none).
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub target: TaskTarget,
    pub candidates: Vec<CandidateRecord>,
}

/// A task that failed, with its reason.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub task_id: Uuid,
    pub target: TaskTarget,
    /// Machine-readable reason label
    pub kind: &'static str,
    pub reason: String,
    #[serde(skip)]
    pub error: TaskError,
}

/// Result of a batch run. Never an error: every task lands in one list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: Vec<TaskOutcome>,
    pub failed: Vec<TaskFailure>,
    /// Tasks never started because the batch was cancelled
    pub not_started: Vec<TaskTarget>,
    pub cancelled: bool,
}

impl BatchSummary {
    /// Candidates from every successful task, in task order.
    pub fn candidates(&self) -> Vec<CandidateRecord> {
        self.succeeded
            .iter()
            .flat_map(|o| o.candidates.iter().cloned())
            .collect()
    }

    pub fn candidate_count(&self) -> usize {
        self.succeeded.iter().map(|o| o.candidates.len()).sum()
    }
}

/// Drives discovery tasks through fresh sessions.
pub struct DiscoveryOrchestrator {
    sessions: SessionLifecycleManager,
    inter_task_delay: Duration,
}

impl DiscoveryOrchestrator {
    pub fn new(sessions: SessionLifecycleManager) -> Self {
        Self {
            sessions,
            inter_task_delay: DEFAULT_INTER_TASK_DELAY,
        }
    }

    pub fn with_inter_task_delay(mut self, delay: Duration) -> Self {
        self.inter_task_delay = delay;
        self
    }

    pub fn sessions(&self) -> &SessionLifecycleManager {
        &self.sessions
    }

    /// Run a single task under its own deadline.
    pub async fn run_task(&self, task: &DiscoveryTask) -> TaskResult<Vec<CandidateRecord>> {
        info!(
            task_id = %task.id,
            target = %task.target,
            kind = %task.kind,
            deadline_secs = task.deadline.as_secs(),
            "Starting discovery task"
        );
        self.sessions.run(task).await
    }

    /// Run tasks one after another.
    ///
    /// A failed task never stops the batch. Cancelling `cancel` abandons
    /// the running task (its session is released as its future drops),
    /// records it as cancelled and starts nothing further.
    pub async fn run_batch(
        &self,
        tasks: Vec<DiscoveryTask>,
        cancel: &CancellationToken,
    ) -> BatchSummary {
        let total = tasks.len();
        let mut summary = BatchSummary::default();

        for (index, task) in tasks.into_iter().enumerate() {
            if index > 0 && !self.inter_task_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = sleep(self.inter_task_delay) => {}
                }
            }

            if cancel.is_cancelled() {
                summary.cancelled = true;
                summary.not_started.push(task.target);
                continue;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TaskError::Cancelled),
                result = self.run_task(&task) => result,
            };

            match result {
                Ok(candidates) => {
                    info!(
                        task = index + 1,
                        total,
                        target = %task.target,
                        candidates = candidates.len(),
                        "Task succeeded"
                    );
                    summary.succeeded.push(TaskOutcome {
                        task_id: task.id,
                        target: task.target,
                        candidates,
                    });
                }
                Err(error) => {
                    if matches!(error, TaskError::Cancelled) {
                        summary.cancelled = true;
                    }
                    warn!(
                        task = index + 1,
                        total,
                        target = %task.target,
                        kind = error.kind(),
                        error = %error,
                        "Task failed"
                    );
                    summary.failed.push(TaskFailure {
                        task_id: task.id,
                        target: task.target,
                        kind: error.kind(),
                        reason: error.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            not_started = summary.not_started.len(),
            cancelled = summary.cancelled,
            "Batch finished"
        );
        summary
    }
}
