//! Grant Discovery Oracle
//!
//! Finds startup grants with AI backends and turns what they extract into
//! vetted, deduplicated, scored records.
//!
//! # Pieces
//!
//! - Discovery runs one task at a time. Each task gets a fresh session whose
//!   backend calls go through a rate-limited fallback controller (primary,
//!   then one fallback, never back).
//! - The quality pipeline scores confidence, collapses duplicates, matches
//!   eligibility against a requester profile, refreshes status and
//!   estimates application complexity.
//! - Storage and notification sit behind traits; this crate ships an
//!   in-memory store and a logging notifier.
//!
//! # Usage
//!
//! ```rust,ignore
//! use grant_oracle::{GrantOracle, OracleConfig, DiscoveryTask};
//!
//! let config = OracleConfig::from_env()?;
//! let controller = Arc::new(config.controller()?);
//! let sessions = SessionLifecycleManager::new(controller, Arc::new(HttpFetcher::new()?));
//! let oracle = GrantOracle::new(
//!     DiscoveryOrchestrator::new(sessions),
//!     QualityPipeline::new(Arc::new(HttpFetcher::new()?)),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(TracingNotifier),
//! );
//!
//! let run = oracle
//!     .run_discovery(vec![DiscoveryTask::discover("https://seedfund.startupindia.gov.in")], None, &cancel)
//!     .await;
//! ```
//!
//! # Modules
//!
//! - [`backends`] - Backend adapters, rate limiting and fallback
//! - [`session`] - Per-task session lifecycle
//! - [`discovery`] - Task orchestration, prompts and output parsing
//! - [`quality`] - The five quality stages and the pipeline
//! - [`oracle`] - Discovery + vetting + storage + notification
//! - [`traits`] - Collaborator seams (fetcher, prober, store, notifier)
//! - [`testing`] - Mock implementations for testing

pub mod backends;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetchers;
pub mod oracle;
pub mod quality;
pub mod security;
pub mod session;
pub mod stores;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use backends::{
    BackendAdapter, FallbackController, FallbackRun, FallbackState, GeminiBackend, Generation,
    OpenAiBackend, Prompt, RateLimiter,
};
pub use config::OracleConfig;
pub use discovery::{BatchSummary, DiscoveryOrchestrator, TaskFailure, TaskOutcome};
pub use error::{
    BackendError, BackendErrorKind, ExtractionError, FallbackError, SessionError, StoreError,
    TaskError,
};
pub use fetchers::HttpFetcher;
pub use oracle::{DiscoveryRun, GrantOracle, RefreshReport};
pub use quality::{
    ComplexityEstimator, ConfidenceScorer, Deduplicator, EligibilityMatcher, QualityOutput,
    QualityPipeline, QualityRequest, StatusMonitor,
};
pub use session::{SessionHandle, SessionLifecycleManager};
pub use stores::MemoryStore;
pub use traits::{Notifier, PageFetcher, RecordStore, SourceProber, TracingNotifier};
pub use types::{
    BackendDescriptor, CandidateRecord, DiscoveryTask, GrantEvent, GrantStatus, OperationKind,
    RequesterProfile, RunReport, TaskRequest, TaskTarget, VettedRecord,
};
