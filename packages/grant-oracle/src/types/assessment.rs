//! Results attached to a record by the quality stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::ExtractionMethod;

/// Trust class of the host a record was found on.
///
/// Ordered from most to least trusted, with `Unknown` as the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    OfficialPortal,
    GovernmentWebsite,
    NewsArticle,
    BlogPost,
    SocialMedia,
    #[default]
    Unknown,
}

impl SourceType {
    /// Base confidence for data from this class of source.
    pub fn base_score(self) -> f64 {
        match self {
            Self::OfficialPortal => 0.9,
            Self::GovernmentWebsite => 0.85,
            Self::NewsArticle => 0.6,
            Self::BlogPost => 0.4,
            Self::SocialMedia => 0.3,
            Self::Unknown => 0.5,
        }
    }
}

/// Where a confidence score came from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataLineage {
    pub source_type: SourceType,
    pub extraction_method: ExtractionMethod,
    /// Human-readable quality signals (e.g. `clear_deadline_found`)
    pub quality_indicators: Vec<String>,
    /// Modifiers applied to the base score, in application order
    pub confidence_factors: Vec<String>,
    pub data_completeness: BTreeMap<String, bool>,
    pub base_score: f64,
    pub final_score: f64,
}

/// Per-criterion eligibility sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CriterionScores {
    pub stage: f64,
    pub sector: f64,
    pub location: f64,
    pub funding: f64,
    pub company_age: f64,
    pub team_size: f64,
    pub special_criteria: f64,
}

/// Outcome of matching one record against one requester profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EligibilityMatch {
    /// Weighted sum of the sub-scores, in [0, 1]
    pub score: f64,
    pub breakdown: CriterionScores,
    /// Improvement suggestions for weakly matched criteria
    pub reasons: Vec<String>,
}

/// Four ordered levels of application effort.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Simple,
    #[default]
    Medium,
    Complex,
    VeryComplex,
}

impl ComplexityLevel {
    /// Map an overall score in [0, 1] to a level.
    pub fn from_score(score: f64) -> Self {
        if score <= 0.3 {
            Self::Simple
        } else if score <= 0.5 {
            Self::Medium
        } else if score <= 0.8 {
            Self::Complex
        } else {
            Self::VeryComplex
        }
    }

    /// Nominal effort to prepare an application, for display.
    pub fn estimated_effort_hours(self) -> u32 {
        match self {
            Self::Simple => 8,
            Self::Medium => 24,
            Self::Complex => 56,
            Self::VeryComplex => 120,
        }
    }
}

/// Sub-score for one complexity factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub score: f64,
    pub level: ComplexityLevel,
    pub details: String,
}

/// Application complexity estimate for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub level: ComplexityLevel,
    pub score: f64,
    pub estimated_effort_hours: u32,
    pub factors: BTreeMap<String, FactorScore>,
    pub reasons: Vec<String>,
}

/// Where a record's deadline sits relative to now.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineStatus {
    Open,
    OpenNearDeadline,
    ClosingSoon,
    Expired,
    Rolling,
    #[default]
    Unknown,
}
