//! Typed errors for the grant oracle.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the fallback
//! controller and batch runner can switch on error structure instead of
//! error-message text.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes a backend call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Provider refused the call for quota reasons (HTTP 429 and friends)
    RateLimited,
    /// Provider unreachable, 5xx, auth rejected, or otherwise unhealthy
    Unavailable,
    /// Call did not complete before its deadline
    Timeout,
    /// Provider answered, but the answer is unusable
    InvalidResponse,
}

impl BackendErrorKind {
    /// Whether this failure says something about backend health.
    ///
    /// `InvalidResponse` usually points at the prompt, not the provider.
    pub fn is_health_signal(self) -> bool {
        !matches!(self, Self::InvalidResponse)
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid response",
        };
        f.write_str(s)
    }
}

/// Error from a single backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{backend} backend {kind}: {message}")]
pub struct BackendError {
    /// Name of the backend that failed
    pub backend: String,
    /// Failure class
    pub kind: BackendErrorKind,
    /// Human-readable detail (never used for control flow)
    pub message: String,
}

impl BackendError {
    pub fn new(
        backend: impl Into<String>,
        kind: BackendErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend, BackendErrorKind::RateLimited, message)
    }

    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend, BackendErrorKind::Unavailable, message)
    }

    pub fn timeout(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend, BackendErrorKind::Timeout, message)
    }

    pub fn invalid_response(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend, BackendErrorKind::InvalidResponse, message)
    }
}

/// Errors surfaced by the fallback controller.
#[derive(Debug, Clone, Error)]
pub enum FallbackError {
    /// Primary and fallback (if any) both failed
    #[error("all backends exhausted (tried: {}); last error: {last}", tried.join(", "))]
    AllBackendsExhausted {
        /// Backends attempted, in order
        tried: Vec<String>,
        /// Final error observed
        last: BackendError,
    },

    /// A backend answered with something unusable; not retried elsewhere
    #[error("backend returned an invalid response: {0}")]
    InvalidResponse(BackendError),

    /// Requested backend has no credentials at this process
    #[error("backend not configured: {0}")]
    NotConfigured(String),
}

/// Named steps of a discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    FetchContext,
    Survey,
    Extract,
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FetchContext => "fetch_context",
            Self::Survey => "survey",
            Self::Extract => "extract",
        };
        f.write_str(s)
    }
}

/// Errors from the session lifecycle.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Session could not be set up (no usable backend, pinned backend missing)
    #[error("session creation failed: {reason}")]
    CreationFailed { reason: String },

    /// A non-backend step failed (e.g. the page could not be fetched)
    #[error("session step {step} failed: {reason}")]
    StepFailed { step: SessionStep, reason: String },

    /// Task deadline expired; partial results were discarded
    #[error("session deadline of {budget:?} exceeded")]
    DeadlineExceeded { budget: Duration },
}

/// Backend output that could not be turned into candidate records.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// No JSON payload could be located in the response
    #[error("no JSON payload in backend output")]
    NoPayload,

    /// JSON was found but did not have the expected shape
    #[error("malformed extraction payload: {0}")]
    Malformed(String),
}

/// Why a single discovery task failed.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error(transparent)]
    Backend(#[from] FallbackError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The batch was cancelled while this task was running
    #[error("task cancelled")]
    Cancelled,
}

impl TaskError {
    /// Short machine-readable label for batch summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend(FallbackError::AllBackendsExhausted { .. }) => "all_backends_exhausted",
            Self::Backend(FallbackError::InvalidResponse(_)) => "invalid_response",
            Self::Backend(FallbackError::NotConfigured(_)) => "backend_not_configured",
            Self::Session(SessionError::CreationFailed { .. }) => "session_creation_failed",
            Self::Session(SessionError::StepFailed { .. }) => "session_step_failed",
            Self::Session(SessionError::DeadlineExceeded { .. }) => "deadline_exceeded",
            Self::Extraction(_) => "extraction_error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Errors fetching page or document content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-success HTTP status
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Transport failure
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Local document could not be read
    #[error("failed to read document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Record could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the notification collaborator.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Result type alias for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type alias for discovery tasks.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
