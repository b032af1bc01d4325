//! Primary/fallback backend selection.
//!
//! A [`FallbackRun`] is created per task. It starts on the primary backend
//! and moves to the fallback on the first rate-limit or availability
//! failure, or after repeated timeouts. It never moves back within the
//! same run; the next task starts on the primary again.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BackendAdapter, Prompt};
use crate::error::{BackendError, BackendErrorKind, FallbackError};

/// Consecutive timeouts on one backend before switching away from it.
pub const DEFAULT_MAX_CONSECUTIVE_TIMEOUTS: u32 = 2;

/// Upper bound on a single backend attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which backend a run is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackState {
    PrimaryActive,
    FallbackActive,
}

/// One backend attempt, for logging and assertions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub backend: String,
    pub state: FallbackState,
    /// `None` on success
    pub failure: Option<BackendErrorKind>,
    pub elapsed: Duration,
}

/// Generated text plus the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub used_backend: String,
}

/// Chooses backends for each task.
///
/// Holds every configured adapter. The primary is the configured one
/// (or the first registered); the fallback is the first other adapter.
pub struct FallbackController {
    adapters: Vec<Arc<dyn BackendAdapter>>,
    primary: Option<String>,
    pinned: Option<String>,
    max_consecutive_timeouts: u32,
    attempt_timeout: Duration,
}

impl FallbackController {
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>) -> Self {
        Self {
            adapters,
            primary: None,
            pinned: None,
            max_consecutive_timeouts: DEFAULT_MAX_CONSECUTIVE_TIMEOUTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Prefer `backend` as primary when it is configured.
    pub fn with_primary(mut self, backend: impl Into<String>) -> Self {
        self.primary = Some(backend.into());
        self
    }

    /// Use only `backend`; failures are never retried elsewhere.
    pub fn with_pinned(mut self, backend: Option<String>) -> Self {
        self.pinned = backend;
        self
    }

    pub fn with_max_consecutive_timeouts(mut self, max: u32) -> Self {
        self.max_consecutive_timeouts = max.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Names of the configured backends, in registration order.
    pub fn backends(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    fn find(&self, name: &str) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Start a run for one task.
    ///
    /// `preferred` overrides the configured primary for this task only.
    pub fn begin(&self, preferred: Option<&str>) -> Result<FallbackRun, FallbackError> {
        if let Some(pinned) = &self.pinned {
            let adapter = self
                .find(pinned)
                .ok_or_else(|| FallbackError::NotConfigured(pinned.clone()))?;
            return Ok(self.run_with(adapter, None));
        }

        let preferred = match preferred {
            Some(name) if self.find(name).is_none() => {
                warn!(backend = name, "Preferred backend not configured, using default order");
                None
            }
            other => other,
        };

        let primary = preferred
            .or(self.primary.as_deref())
            .and_then(|name| self.find(name))
            .or_else(|| self.adapters.first().cloned())
            .ok_or_else(|| FallbackError::NotConfigured("no backends configured".into()))?;

        let fallback = self
            .adapters
            .iter()
            .find(|a| a.name() != primary.name())
            .cloned();

        Ok(self.run_with(primary, fallback))
    }

    fn run_with(
        &self,
        primary: Arc<dyn BackendAdapter>,
        fallback: Option<Arc<dyn BackendAdapter>>,
    ) -> FallbackRun {
        FallbackRun {
            primary,
            fallback,
            state: FallbackState::PrimaryActive,
            consecutive_timeouts: 0,
            max_consecutive_timeouts: self.max_consecutive_timeouts,
            attempt_timeout: self.attempt_timeout,
            attempts: Vec::new(),
        }
    }

    /// One-shot generation on a fresh run.
    pub async fn execute(
        &self,
        prompt: &Prompt,
        deadline: Instant,
    ) -> Result<Generation, FallbackError> {
        self.begin(None)?.execute(prompt, deadline).await
    }
}

/// Backend selection state for one task.
pub struct FallbackRun {
    primary: Arc<dyn BackendAdapter>,
    fallback: Option<Arc<dyn BackendAdapter>>,
    state: FallbackState,
    consecutive_timeouts: u32,
    max_consecutive_timeouts: u32,
    attempt_timeout: Duration,
    attempts: Vec<AttemptRecord>,
}

impl FallbackRun {
    pub fn state(&self) -> FallbackState {
        self.state
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Backend the next attempt will use.
    pub fn active_backend(&self) -> &str {
        self.active().name()
    }

    fn active(&self) -> &Arc<dyn BackendAdapter> {
        match (self.state, &self.fallback) {
            (FallbackState::FallbackActive, Some(fallback)) => fallback,
            _ => &self.primary,
        }
    }

    fn tried(&self) -> Vec<String> {
        let mut tried: Vec<String> = Vec::new();
        for attempt in &self.attempts {
            if !tried.contains(&attempt.backend) {
                tried.push(attempt.backend.clone());
            }
        }
        tried
    }

    /// Generate text, switching to the fallback when the active backend
    /// looks unhealthy.
    pub async fn execute(
        &mut self,
        prompt: &Prompt,
        deadline: Instant,
    ) -> Result<Generation, FallbackError> {
        loop {
            let adapter = self.active().clone();
            let backend = adapter.name().to_string();
            let started = Instant::now();
            let attempt_deadline = deadline.min(started + self.attempt_timeout);

            let result = adapter.generate(prompt, attempt_deadline).await;
            let elapsed = started.elapsed();

            match result {
                Ok(text) => {
                    debug!(backend = %backend, elapsed_ms = elapsed.as_millis() as u64, "Backend attempt succeeded");
                    self.record(backend.clone(), None, elapsed);
                    self.consecutive_timeouts = 0;
                    return Ok(Generation {
                        text,
                        used_backend: backend,
                    });
                }
                Err(err) => {
                    warn!(
                        backend = %backend,
                        kind = %err.kind,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %err.message,
                        "Backend attempt failed"
                    );
                    self.record(backend, Some(err.kind), elapsed);
                    self.handle_failure(err)?;
                }
            }
        }
    }

    fn record(&mut self, backend: String, failure: Option<BackendErrorKind>, elapsed: Duration) {
        self.attempts.push(AttemptRecord {
            backend,
            state: self.state,
            failure,
            elapsed,
        });
    }

    /// Decide what follows a failed attempt. `Ok` means try again.
    fn handle_failure(&mut self, err: BackendError) -> Result<(), FallbackError> {
        match err.kind {
            BackendErrorKind::InvalidResponse => Err(FallbackError::InvalidResponse(err)),
            BackendErrorKind::Timeout => {
                self.consecutive_timeouts += 1;
                if self.consecutive_timeouts < self.max_consecutive_timeouts {
                    debug!(backend = %err.backend, "Retrying after timeout");
                    Ok(())
                } else {
                    self.switch_to_fallback(err)
                }
            }
            BackendErrorKind::RateLimited | BackendErrorKind::Unavailable => {
                self.switch_to_fallback(err)
            }
        }
    }

    fn switch_to_fallback(&mut self, err: BackendError) -> Result<(), FallbackError> {
        match (self.state, &self.fallback) {
            (FallbackState::PrimaryActive, Some(fallback)) => {
                info!(
                    from = %err.backend,
                    to = fallback.name(),
                    reason = %err.kind,
                    "Switching to fallback backend"
                );
                self.state = FallbackState::FallbackActive;
                self.consecutive_timeouts = 0;
                Ok(())
            }
            _ => Err(FallbackError::AllBackendsExhausted {
                tried: self.tried(),
                last: err,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockReply};

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(600)
    }

    fn controller(primary: &Arc<MockBackend>, fallback: &Arc<MockBackend>) -> FallbackController {
        FallbackController::new(vec![
            primary.clone() as Arc<dyn BackendAdapter>,
            fallback.clone() as Arc<dyn BackendAdapter>,
        ])
    }

    fn prompt() -> Prompt {
        Prompt::new("system", "find grants")
    }

    #[tokio::test]
    async fn test_primary_success_stays_on_primary() {
        let openai = Arc::new(MockBackend::new("openai").replying("ok"));
        let gemini = Arc::new(MockBackend::new("gemini").replying("unused"));

        let generation = controller(&openai, &gemini)
            .execute(&prompt(), far_deadline())
            .await
            .unwrap();

        assert_eq!(generation.used_backend, "openai");
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_primary_switches_after_one_failure() {
        let openai = Arc::new(MockBackend::new("openai").failing(BackendErrorKind::Unavailable));
        let gemini = Arc::new(MockBackend::new("gemini").replying("from gemini"));

        let mut run = controller(&openai, &gemini).begin(None).unwrap();
        let generation = run.execute(&prompt(), far_deadline()).await.unwrap();

        assert_eq!(generation.used_backend, "gemini");
        assert_eq!(generation.text, "from gemini");
        assert_eq!(openai.call_count(), 1);
        assert_eq!(run.state(), FallbackState::FallbackActive);
        assert_eq!(run.attempts()[0].failure, Some(BackendErrorKind::Unavailable));
        assert_eq!(run.attempts()[1].failure, None);
    }

    #[tokio::test]
    async fn test_rate_limited_primary_switches() {
        let openai = Arc::new(MockBackend::new("openai").failing(BackendErrorKind::RateLimited));
        let gemini = Arc::new(MockBackend::new("gemini").replying("ok"));

        let generation = controller(&openai, &gemini)
            .execute(&prompt(), far_deadline())
            .await
            .unwrap();
        assert_eq!(generation.used_backend, "gemini");
    }

    #[tokio::test]
    async fn test_single_timeout_retries_primary() {
        let openai = Arc::new(
            MockBackend::new("openai")
                .then(MockReply::Fail(BackendErrorKind::Timeout))
                .replying("second try"),
        );
        let gemini = Arc::new(MockBackend::new("gemini").replying("unused"));

        let generation = controller(&openai, &gemini)
            .execute(&prompt(), far_deadline())
            .await
            .unwrap();

        assert_eq!(generation.used_backend, "openai");
        assert_eq!(openai.call_count(), 2);
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_timeouts_switch_to_fallback() {
        let openai = Arc::new(MockBackend::new("openai").then(MockReply::Hang).then(MockReply::Hang));
        let gemini = Arc::new(MockBackend::new("gemini").replying("ok"));

        let generation = controller(&openai, &gemini)
            .with_attempt_timeout(Duration::from_secs(5))
            .execute(&prompt(), far_deadline())
            .await
            .unwrap();

        assert_eq!(generation.used_backend, "gemini");
        assert_eq!(openai.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let openai =
            Arc::new(MockBackend::new("openai").failing(BackendErrorKind::InvalidResponse));
        let gemini = Arc::new(MockBackend::new("gemini").replying("unused"));

        let err = controller(&openai, &gemini)
            .execute(&prompt(), far_deadline())
            .await
            .unwrap_err();

        assert!(matches!(err, FallbackError::InvalidResponse(_)));
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn test_both_failing_exhausts() {
        let openai = Arc::new(MockBackend::new("openai").failing(BackendErrorKind::Unavailable));
        let gemini = Arc::new(MockBackend::new("gemini").failing(BackendErrorKind::RateLimited));

        let err = controller(&openai, &gemini)
            .execute(&prompt(), far_deadline())
            .await
            .unwrap_err();

        match err {
            FallbackError::AllBackendsExhausted { tried, last } => {
                assert_eq!(tried, vec!["openai".to_string(), "gemini".to_string()]);
                assert_eq!(last.kind, BackendErrorKind::RateLimited);
            }
            other => panic!("expected AllBackendsExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_backend_failure_exhausts() {
        let openai = Arc::new(MockBackend::new("openai").failing(BackendErrorKind::Unavailable));
        let controller =
            FallbackController::new(vec![openai.clone() as Arc<dyn BackendAdapter>]);

        let err = controller.execute(&prompt(), far_deadline()).await.unwrap_err();
        assert!(matches!(err, FallbackError::AllBackendsExhausted { .. }));
    }

    #[tokio::test]
    async fn test_no_switch_back_within_run() {
        let openai = Arc::new(
            MockBackend::new("openai")
                .then(MockReply::Fail(BackendErrorKind::Unavailable))
                .replying("healthy again"),
        );
        let gemini = Arc::new(MockBackend::new("gemini").replying("fallback"));
        let controller = controller(&openai, &gemini);

        let mut run = controller.begin(None).unwrap();
        run.execute(&prompt(), far_deadline()).await.unwrap();
        let second = run.execute(&prompt(), far_deadline()).await.unwrap();
        assert_eq!(second.used_backend, "gemini");
        assert_eq!(openai.call_count(), 1);

        let mut next_task = controller.begin(None).unwrap();
        let fresh = next_task.execute(&prompt(), far_deadline()).await.unwrap();
        assert_eq!(fresh.used_backend, "openai");
    }

    #[tokio::test]
    async fn test_preferred_backend_becomes_primary() {
        let openai = Arc::new(MockBackend::new("openai").replying("openai"));
        let gemini = Arc::new(MockBackend::new("gemini").replying("gemini"));
        let controller = controller(&openai, &gemini);

        let run = controller.begin(Some("gemini")).unwrap();
        assert_eq!(run.active_backend(), "gemini");

        let run = controller.begin(Some("claude")).unwrap();
        assert_eq!(run.active_backend(), "openai");
    }

    #[tokio::test]
    async fn test_pinned_backend_has_no_fallback() {
        let openai = Arc::new(MockBackend::new("openai").replying("unused"));
        let gemini = Arc::new(MockBackend::new("gemini").failing(BackendErrorKind::Unavailable));
        let controller = controller(&openai, &gemini).with_pinned(Some("gemini".into()));

        let err = controller.execute(&prompt(), far_deadline()).await.unwrap_err();
        assert!(matches!(err, FallbackError::AllBackendsExhausted { .. }));
        assert_eq!(openai.call_count(), 0);

        let missing = FallbackController::new(vec![openai as Arc<dyn BackendAdapter>])
            .with_pinned(Some("gemini".into()));
        assert!(matches!(
            missing.begin(None),
            Err(FallbackError::NotConfigured(name)) if name == "gemini"
        ));
    }

    #[test]
    fn test_no_backends_is_not_configured() {
        let controller = FallbackController::new(vec![]);
        assert!(matches!(
            controller.begin(None),
            Err(FallbackError::NotConfigured(_))
        ));
    }
}
