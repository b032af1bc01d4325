//! Discovery: turning tasks into candidate records.

pub mod orchestrator;
pub mod parse;
pub mod prompts;

pub use orchestrator::{
    BatchSummary, DiscoveryOrchestrator, TaskFailure, TaskOutcome, DEFAULT_INTER_TASK_DELAY,
};
pub use parse::parse_candidates;
