//! Fetching the content a discovery session works from.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::TaskTarget;

/// Produces the text of a task target (a page or a document).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the target's text.
    async fn fetch(&self, target: &TaskTarget) -> Result<String, FetchError>;
}
