//! Data model shared by orchestration and the quality pipeline.

pub mod assessment;
pub mod backend;
pub mod event;
pub mod profile;
pub mod record;
pub mod task;

pub use assessment::{
    ComplexityAssessment, ComplexityLevel, CriterionScores, DataLineage, DeadlineStatus,
    EligibilityMatch, FactorScore, SourceType,
};
pub use backend::{BackendDescriptor, CostWeights, GEMINI, OPENAI};
pub use event::{GrantEvent, RunReport};
pub use profile::RequesterProfile;
pub use record::{
    CandidateRecord, DeadlineType, EligibilityCriteria, ExtractionMethod, GrantStatus,
    TargetAudience, VettedRecord,
};
pub use task::{DiscoveryTask, MissingTarget, OperationKind, TaskRequest, TaskTarget};
