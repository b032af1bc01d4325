//! Collaborator traits.
//!
//! Persistence, notification, and network access sit behind these seams so
//! the orchestration and quality logic can be exercised with in-memory
//! implementations.

pub mod fetcher;
pub mod notifier;
pub mod prober;
pub mod store;

pub use fetcher::PageFetcher;
pub use notifier::{Notifier, TracingNotifier};
pub use prober::{ProbeOutcome, SourceProber};
pub use store::{RecordStore, UpsertOutcome};
