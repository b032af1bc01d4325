//! AI backends behind one capability trait.
//!
//! Each adapter wraps a distinct remote provider; callers never branch on
//! which backend answered. Every adapter waits on the shared
//! [`RateLimiter`] before issuing its remote call.

pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod rate_limit;

pub use fallback::{AttemptRecord, FallbackController, FallbackRun, FallbackState, Generation};
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use rate_limit::RateLimiter;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::Instant;

use crate::error::{BackendError, BackendResult};
use crate::types::BackendDescriptor;

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Ask the provider for a JSON-only answer
    pub json_output: bool,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json_output: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Uniform text-generation capability over one remote provider.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Static description of this backend.
    fn descriptor(&self) -> &BackendDescriptor;

    /// Backend identity.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Generate text for `prompt`, giving up at `deadline`.
    ///
    /// Consumes one unit of provider quota. Fails with a typed
    /// [`BackendError`]; the message is informational only.
    async fn generate(&self, prompt: &Prompt, deadline: Instant) -> BackendResult<String>;
}

/// Map a non-success HTTP status to an error kind.
pub(crate) fn classify_status(backend: &str, status: StatusCode, body: &str) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 300));
    match status.as_u16() {
        429 => BackendError::rate_limited(backend, message),
        408 | 504 => BackendError::timeout(backend, message),
        401 | 403 => BackendError::unavailable(backend, message),
        s if s >= 500 => BackendError::unavailable(backend, message),
        _ => BackendError::invalid_response(backend, message),
    }
}

/// Map a transport failure to an error kind.
pub(crate) fn classify_transport(backend: &str, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::timeout(backend, err.to_string())
    } else if err.is_decode() {
        BackendError::invalid_response(backend, err.to_string())
    } else {
        BackendError::unavailable(backend, err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
