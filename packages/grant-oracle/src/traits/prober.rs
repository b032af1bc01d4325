//! Probing a record's source for open/closed signals.

use async_trait::async_trait;

/// Result of probing a source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The page answered; body text for keyword scanning
    Content(String),
    /// The page could not be retrieved
    Unreachable { status: Option<u16> },
}

/// Retrieves a source page for status monitoring.
///
/// Never fails: anything short of a readable page is `Unreachable`.
#[async_trait]
pub trait SourceProber: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}
