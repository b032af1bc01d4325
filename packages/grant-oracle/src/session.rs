//! Discovery session lifecycle.
//!
//! Every task gets a fresh session: its own id, its own backend-selection
//! state and its own transcript. Nothing from one task's conversation
//! reaches the next. The session is released on every exit path,
//! including deadline expiry and cancellation (the guard's `Drop` runs
//! when the task future is dropped).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backends::{FallbackController, FallbackRun};
use crate::discovery::{parse, prompts};
use crate::error::{SessionError, SessionStep, TaskResult};
use crate::traits::PageFetcher;
use crate::types::{CandidateRecord, DiscoveryTask, OperationKind};

/// Default team identity attached to sessions.
pub const DEFAULT_TEAM: &str = "grant-discovery";

/// Identity of a live session. Dropping it releases the session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: Uuid,
    pub team: String,
    active: Arc<AtomicUsize>,
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(session_id = %self.id, team = %self.team, "Session released");
    }
}

/// One backend exchange within a session.
#[derive(Debug, Clone)]
struct Exchange {
    step: SessionStep,
    backend: String,
    response_chars: usize,
}

/// Per-task conversation state.
struct DiscoverySession {
    handle: SessionHandle,
    run: FallbackRun,
    transcript: Vec<Exchange>,
}

impl DiscoverySession {
    async fn drive(
        &mut self,
        task: &DiscoveryTask,
        fetcher: &dyn PageFetcher,
        deadline: Instant,
    ) -> TaskResult<Vec<CandidateRecord>> {
        let content = fetcher
            .fetch(&task.target)
            .await
            .map_err(|e| SessionError::StepFailed {
                step: SessionStep::FetchContext,
                reason: e.to_string(),
            })?;

        let notes = match task.kind {
            OperationKind::Discover | OperationKind::ExtractPdf => {
                let prompt = prompts::survey(task, &content);
                Some(self.exchange(SessionStep::Survey, &prompt, deadline).await?)
            }
            OperationKind::Validate => None,
        };

        let prompt = prompts::extract(task, &content, notes.as_deref());
        let answer = self.exchange(SessionStep::Extract, &prompt, deadline).await?;

        Ok(parse::parse_candidates(&answer, task)?)
    }

    async fn exchange(
        &mut self,
        step: SessionStep,
        prompt: &crate::backends::Prompt,
        deadline: Instant,
    ) -> TaskResult<String> {
        let generation = self.run.execute(prompt, deadline).await?;
        debug!(
            session_id = %self.handle.id,
            step = %step,
            backend = %generation.used_backend,
            "Session exchange completed"
        );
        self.transcript.push(Exchange {
            step,
            backend: generation.used_backend,
            response_chars: generation.text.len(),
        });
        Ok(generation.text)
    }
}

/// Creates, drives and releases discovery sessions.
pub struct SessionLifecycleManager {
    controller: Arc<FallbackController>,
    fetcher: Arc<dyn PageFetcher>,
    team: String,
    active: Arc<AtomicUsize>,
}

impl SessionLifecycleManager {
    pub fn new(controller: Arc<FallbackController>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            controller,
            fetcher,
            team: DEFAULT_TEAM.to_string(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    /// Sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn open(&self, task: &DiscoveryTask) -> Result<DiscoverySession, SessionError> {
        let run = self
            .controller
            .begin(task.preferred_backend.as_deref())
            .map_err(|e| SessionError::CreationFailed {
                reason: e.to_string(),
            })?;

        self.active.fetch_add(1, Ordering::SeqCst);
        let handle = SessionHandle {
            id: Uuid::now_v7(),
            team: self.team.clone(),
            active: self.active.clone(),
        };
        debug!(
            session_id = %handle.id,
            task_id = %task.id,
            backend = run.active_backend(),
            "Session created"
        );

        Ok(DiscoverySession {
            handle,
            run,
            transcript: Vec::new(),
        })
    }

    /// Run one task in a fresh session, bounded by the task's deadline.
    ///
    /// On deadline expiry partial results are discarded and the error is
    /// `DeadlineExceeded`.
    pub async fn run(&self, task: &DiscoveryTask) -> TaskResult<Vec<CandidateRecord>> {
        let deadline = Instant::now() + task.deadline;
        let mut session = self.open(task)?;

        let outcome = timeout_at(
            deadline,
            session.drive(task, self.fetcher.as_ref(), deadline),
        )
        .await;

        let exchanges = session.transcript.len();
        let used: Vec<&str> = session.transcript.iter().map(|e| e.backend.as_str()).collect();
        let response_chars: usize = session.transcript.iter().map(|e| e.response_chars).sum();
        let steps: Vec<String> = session.transcript.iter().map(|e| e.step.to_string()).collect();
        debug!(
            session_id = %session.handle.id,
            exchanges,
            response_chars,
            steps = ?steps,
            backends = ?used,
            "Session transcript"
        );

        let expired = SessionError::DeadlineExceeded {
            budget: task.deadline,
        };
        match outcome {
            Err(_) => {
                warn!(
                    task_id = %task.id,
                    target = %task.target,
                    budget = ?task.deadline,
                    "Session deadline exceeded"
                );
                Err(expired.into())
            }
            // Attempts cut short by the task deadline surface as backend
            // timeouts; report the deadline instead.
            Ok(Err(e)) if Instant::now() >= deadline => {
                warn!(
                    task_id = %task.id,
                    target = %task.target,
                    last_error = %e,
                    "Session deadline exceeded during backend attempt"
                );
                Err(expired.into())
            }
            Ok(Ok(candidates)) => {
                info!(
                    task_id = %task.id,
                    target = %task.target,
                    candidates = candidates.len(),
                    "Session completed"
                );
                Ok(candidates)
            }
            Ok(Err(e)) => Err(e),
        }
    }
}
