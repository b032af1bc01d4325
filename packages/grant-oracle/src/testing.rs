//! Testing utilities including mock implementations.
//!
//! These let applications exercise discovery and the quality pipeline
//! without network access or real AI calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout_at, Instant};

use crate::backends::{BackendAdapter, Prompt, RateLimiter};
use crate::error::{
    BackendError, BackendErrorKind, BackendResult, FetchError, NotifyError, StoreError,
    StoreResult,
};
use crate::traits::{
    Notifier, PageFetcher, ProbeOutcome, RecordStore, SourceProber, UpsertOutcome,
};
use crate::types::{BackendDescriptor, GrantEvent, GrantStatus, TaskTarget, VettedRecord};

/// What a mock backend does for one call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(BackendErrorKind),
    /// Never answer; the call ends when its deadline passes
    Hang,
}

/// Record of a call made to a mock backend.
#[derive(Debug, Clone)]
pub struct MockBackendCall {
    pub system: String,
    pub user: String,
    pub at: Instant,
}

/// A scriptable backend adapter.
///
/// Replies come from, in order: the queued script, the first keyed reply
/// whose needle appears in the user prompt, then the default reply.
pub struct MockBackend {
    descriptor: BackendDescriptor,
    script: Arc<RwLock<VecDeque<MockReply>>>,
    keyed: Arc<RwLock<Vec<(String, MockReply)>>>,
    default_reply: MockReply,
    delay: Option<Duration>,
    limiter: Option<Arc<RateLimiter>>,
    calls: Arc<RwLock<Vec<MockBackendCall>>>,
}

impl MockBackend {
    /// Backend with no rate floor that answers `{"grants":[]}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: BackendDescriptor::new(name, "mock-model")
                .with_min_interval(Duration::ZERO),
            script: Arc::default(),
            keyed: Arc::default(),
            default_reply: MockReply::Text(r#"{"grants":[]}"#.to_string()),
            delay: None,
            limiter: None,
            calls: Arc::default(),
        }
    }

    /// Default reply text.
    pub fn replying(mut self, text: impl Into<String>) -> Self {
        self.default_reply = MockReply::Text(text.into());
        self
    }

    /// Fail every unscripted call with `kind`.
    pub fn failing(mut self, kind: BackendErrorKind) -> Self {
        self.default_reply = MockReply::Fail(kind);
        self
    }

    /// Queue a reply for the next unscripted call.
    pub fn then(self, reply: MockReply) -> Self {
        self.script.write().unwrap().push_back(reply);
        self
    }

    /// Reply with `text` whenever the user prompt contains `needle`.
    pub fn replying_for(self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.keyed
            .write()
            .unwrap()
            .push((needle.into(), MockReply::Text(text.into())));
        self
    }

    /// Take this long to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait on a shared limiter before each call.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_descriptor(mut self, descriptor: BackendDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn calls(&self) -> Vec<MockBackendCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    fn next_reply(&self, prompt: &Prompt) -> MockReply {
        if let Some(reply) = self.script.write().unwrap().pop_front() {
            return reply;
        }
        self.keyed
            .read()
            .unwrap()
            .iter()
            .find(|(needle, _)| prompt.user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl BackendAdapter for MockBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn generate(&self, prompt: &Prompt, deadline: Instant) -> BackendResult<String> {
        let name = self.descriptor.name.clone();
        let call = async {
            if let Some(limiter) = &self.limiter {
                limiter.acquire(&name).await;
            }
            self.calls.write().unwrap().push(MockBackendCall {
                system: prompt.system.clone(),
                user: prompt.user.clone(),
                at: Instant::now(),
            });
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            match self.next_reply(prompt) {
                MockReply::Text(text) => Ok(text),
                MockReply::Fail(kind) => Err(BackendError::new(&name, kind, "mock failure")),
                MockReply::Hang => std::future::pending().await,
            }
        };

        match timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(&name, "mock deadline elapsed")),
        }
    }
}

/// A page fetcher serving canned content.
#[derive(Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failing: Arc<RwLock<Vec<String>>>,
    default_page: Option<String>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, target: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(target.into(), content.into());
        self
    }

    /// Content returned for any target without its own page.
    pub fn with_default_page(mut self, content: impl Into<String>) -> Self {
        self.default_page = Some(content.into());
        self
    }

    /// Make fetches of `target` fail with HTTP 404.
    pub fn fail_target(self, target: impl Into<String>) -> Self {
        self.failing.write().unwrap().push(target.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, target: &TaskTarget) -> Result<String, FetchError> {
        let key = target.as_str().to_string();
        self.calls.write().unwrap().push(key.clone());

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        if self.failing.read().unwrap().contains(&key) {
            return Err(FetchError::Status {
                url: key,
                status: 404,
            });
        }

        let page = self.pages.read().unwrap().get(&key).cloned();
        page.or_else(|| self.default_page.clone())
            .ok_or(FetchError::Status {
                url: key,
                status: 404,
            })
    }
}

/// A source prober with canned outcomes per URL.
#[derive(Default)]
pub struct MockProber {
    outcomes: Arc<RwLock<HashMap<String, ProbeOutcome>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.outcomes
            .write()
            .unwrap()
            .insert(url.into(), ProbeOutcome::Content(content.into()));
        self
    }

    pub fn unreachable(self, url: impl Into<String>) -> Self {
        self.outcomes
            .write()
            .unwrap()
            .insert(url.into(), ProbeOutcome::Unreachable { status: Some(503) });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl SourceProber for MockProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.write().unwrap().push(url.to_string());
        self.outcomes
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(ProbeOutcome::Unreachable { status: None })
    }
}

/// A notifier that keeps every event it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Arc<RwLock<Vec<GrantEvent>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record events, then report delivery failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<GrantEvent> {
        self.events.read().unwrap().clone()
    }

    pub fn events_of_kind(&self, kind: &str) -> Vec<GrantEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &GrantEvent) -> Result<(), NotifyError> {
        self.events.write().unwrap().push(event.clone());
        if self.fail {
            return Err(NotifyError("mock delivery failure".into()));
        }
        Ok(())
    }
}

/// A record store whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn upsert(&self, _record: &VettedRecord) -> StoreResult<UpsertOutcome> {
        Err(StoreError::Storage("store offline".into()))
    }

    async fn get(&self, _id: &str) -> StoreResult<Option<VettedRecord>> {
        Err(StoreError::Storage("store offline".into()))
    }

    async fn fetch_by_status(&self, _status: GrantStatus) -> StoreResult<Vec<VettedRecord>> {
        Err(StoreError::Storage("store offline".into()))
    }
}
