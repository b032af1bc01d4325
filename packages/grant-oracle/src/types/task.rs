//! Discovery tasks and the inbound task request.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a discovery task should do with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Browse a page and extract every grant it describes
    Discover,
    /// Extract grants from a document (text already recovered upstream)
    ExtractPdf,
    /// Validate and normalize grant data found at the target
    Validate,
}

impl OperationKind {
    /// Wall-clock budget used when the request does not specify one.
    ///
    /// Discovery gets more time than validation; documents get the most.
    pub fn default_deadline(self) -> Duration {
        match self {
            Self::Discover => Duration::from_secs(120),
            Self::ExtractPdf => Duration::from_secs(180),
            Self::Validate => Duration::from_secs(60),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discover => "discover",
            Self::ExtractPdf => "extract_pdf",
            Self::Validate => "validate",
        };
        f.write_str(s)
    }
}

/// Where a task's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTarget {
    Url(String),
    Document(String),
}

impl TaskTarget {
    /// The URL or document reference as written.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Document(s) => s,
        }
    }
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of discovery work.
///
/// Owned by the orchestration call that processes it and dropped when
/// that call returns.
#[derive(Debug, Clone)]
pub struct DiscoveryTask {
    pub id: Uuid,
    pub target: TaskTarget,
    pub kind: OperationKind,
    pub deadline: Duration,
    pub preferred_backend: Option<String>,
    /// Optional topical focus passed into the prompts
    pub focus_area: Option<String>,
}

impl DiscoveryTask {
    pub fn new(target: TaskTarget, kind: OperationKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            target,
            kind,
            deadline: kind.default_deadline(),
            preferred_backend: None,
            focus_area: None,
        }
    }

    pub fn discover(url: impl Into<String>) -> Self {
        Self::new(TaskTarget::Url(url.into()), OperationKind::Discover)
    }

    pub fn extract_pdf(document: impl Into<String>) -> Self {
        Self::new(TaskTarget::Document(document.into()), OperationKind::ExtractPdf)
    }

    pub fn validate(target: TaskTarget) -> Self {
        Self::new(target, OperationKind::Validate)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.preferred_backend = Some(backend.into());
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus_area = Some(focus.into());
        self
    }
}

/// Inbound task request, as received from an outer surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub document_reference: Option<String>,
    pub operation_kind: Option<OperationKind>,
    #[serde(default)]
    pub deadline_seconds: Option<u64>,
    #[serde(default)]
    pub preferred_backend: Option<String>,
    #[serde(default)]
    pub focus_area: Option<String>,
}

/// A task request that names neither a URL nor a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task request needs a url or a document_reference")]
pub struct MissingTarget;

impl TaskRequest {
    /// Convert into a task, applying kind-specific defaults.
    pub fn into_task(self) -> Result<DiscoveryTask, MissingTarget> {
        let (target, default_kind) = match (self.url, self.document_reference) {
            (Some(url), _) => (TaskTarget::Url(url), OperationKind::Discover),
            (None, Some(doc)) => (TaskTarget::Document(doc), OperationKind::ExtractPdf),
            (None, None) => return Err(MissingTarget),
        };

        let kind = self.operation_kind.unwrap_or(default_kind);
        let mut task = DiscoveryTask::new(target, kind);
        if let Some(secs) = self.deadline_seconds {
            task.deadline = Duration::from_secs(secs);
        }
        task.preferred_backend = self.preferred_backend;
        task.focus_area = self.focus_area;
        Ok(task)
    }
}
