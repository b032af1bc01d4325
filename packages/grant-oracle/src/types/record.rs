//! Candidate and vetted grant records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::{ComplexityAssessment, DataLineage, DeadlineStatus, EligibilityMatch};
use crate::text::content_hash;

/// How the data for a record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Structured backend output (JSON schema)
    Structured,
    /// Provider API
    Api,
    /// Free text scraped from a page
    FreeText,
    /// Text recovered from a PDF
    Pdf,
    /// Entered by hand
    Manual,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ExtractionMethod {
    pub fn is_structured(self) -> bool {
        matches!(self, Self::Structured | Self::Api)
    }
}

/// How a grant's deadline recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    Rolling,
    BatchCall,
    Annual,
    ClosedWaitlist,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Lifecycle status of a vetted record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    #[default]
    Live,
    Expired,
    Draft,
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Live => "live",
            Self::Expired => "expired",
            Self::Draft => "draft",
        };
        f.write_str(s)
    }
}

/// Who a grant is aimed at, when the source says so.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetAudience {
    #[serde(default)]
    pub company_age_min: Option<f64>,
    #[serde(default)]
    pub company_age_max: Option<f64>,
    #[serde(default)]
    pub team_size_max: Option<u32>,
    #[serde(default)]
    pub revenue_max_lakh: Option<f64>,
}

/// Unvetted grant data extracted from one source.
///
/// Amounts are in lakh (100,000 INR).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub min_ticket_lakh: Option<f64>,
    #[serde(default)]
    pub max_ticket_lakh: Option<f64>,
    #[serde(default)]
    pub typical_ticket_lakh: Option<f64>,
    /// Deadline as written by the source (ISO date or timestamp)
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub deadline_type: DeadlineType,
    #[serde(default)]
    pub eligibility_text: Option<String>,
    #[serde(default)]
    pub eligibility_flags: Vec<String>,
    #[serde(default)]
    pub sector_tags: Vec<String>,
    #[serde(default)]
    pub state_scope: Option<String>,
    /// Stage bucket (Ideation, MVP Prototype, Early Stage, Growth, Infra)
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub instrument: Vec<String>,
    #[serde(default)]
    pub target_audience: Option<TargetAudience>,
    pub source_url: String,
    #[serde(default)]
    pub extraction_method: ExtractionMethod,
}

impl CandidateRecord {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }

    pub fn with_amount(mut self, typical_lakh: f64) -> Self {
        self.typical_ticket_lakh = Some(typical_lakh);
        self
    }

    pub fn with_deadline(mut self, deadline: impl Into<String>, kind: DeadlineType) -> Self {
        self.deadline = Some(deadline.into());
        self.deadline_type = kind;
        self
    }

    pub fn with_method(mut self, method: ExtractionMethod) -> Self {
        self.extraction_method = method;
        self
    }

    /// Representative amount: typical ticket, else the maximum.
    pub fn amount(&self) -> Option<f64> {
        self.typical_ticket_lakh
            .filter(|a| *a > 0.0)
            .or(self.max_ticket_lakh.filter(|a| *a > 0.0))
    }

    /// Whether a deadline is stated unambiguously.
    pub fn has_clear_deadline(&self) -> bool {
        self.deadline.as_deref().is_some_and(|d| !d.trim().is_empty())
            && self.deadline_type != DeadlineType::Unknown
    }

    /// Stable identifier: content hash of source, title and agency.
    pub fn id(&self) -> String {
        content_hash(&[
            &self.source_url,
            &self.title,
            self.agency.as_deref().unwrap_or(""),
        ])
    }
}

/// Structured eligibility requirements derived from a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    pub stage: Option<String>,
    pub sectors: Vec<String>,
    pub location_scope: Option<String>,
    pub min_ticket_lakh: Option<f64>,
    pub max_ticket_lakh: Option<f64>,
    pub typical_ticket_lakh: Option<f64>,
    pub company_age_min: Option<f64>,
    pub company_age_max: Option<f64>,
    pub team_size_max: Option<u32>,
    pub revenue_max_lakh: Option<f64>,
    pub flags: Vec<String>,
}

impl EligibilityCriteria {
    pub fn from_candidate(candidate: &CandidateRecord) -> Self {
        let audience = candidate.target_audience.clone().unwrap_or_default();
        Self {
            stage: candidate.bucket.clone(),
            sectors: candidate.sector_tags.clone(),
            location_scope: candidate.state_scope.clone(),
            min_ticket_lakh: candidate.min_ticket_lakh,
            max_ticket_lakh: candidate.max_ticket_lakh,
            typical_ticket_lakh: candidate.typical_ticket_lakh,
            company_age_min: audience.company_age_min,
            company_age_max: audience.company_age_max,
            team_size_max: audience.team_size_max,
            revenue_max_lakh: audience.revenue_max_lakh,
            flags: candidate.eligibility_flags.clone(),
        }
    }
}

/// A candidate after quality processing.
///
/// Invariant: `is_duplicate == true` implies `original_id` names a record
/// that is not itself a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VettedRecord {
    pub id: String,
    #[serde(flatten)]
    pub candidate: CandidateRecord,
    pub source_urls: Vec<String>,
    pub confidence: f64,
    pub data_lineage: DataLineage,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default)]
    pub original_id: Option<String>,
    pub eligibility_criteria: EligibilityCriteria,
    #[serde(default)]
    pub eligibility_match: Option<EligibilityMatch>,
    #[serde(default)]
    pub complexity: Option<ComplexityAssessment>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: GrantStatus,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub deadline_status: DeadlineStatus,
    #[serde(default)]
    pub days_until_deadline: Option<i64>,
}

impl VettedRecord {
    /// Wrap a candidate with neutral quality fields.
    pub fn from_candidate(candidate: CandidateRecord) -> Self {
        Self {
            id: candidate.id(),
            source_urls: vec![candidate.source_url.clone()],
            confidence: 0.0,
            data_lineage: DataLineage::default(),
            is_duplicate: false,
            original_id: None,
            eligibility_criteria: EligibilityCriteria::from_candidate(&candidate),
            eligibility_match: None,
            complexity: None,
            last_checked: None,
            status: GrantStatus::Live,
            status_reason: None,
            deadline_status: DeadlineStatus::Unknown,
            days_until_deadline: None,
            candidate,
        }
    }

    pub fn title(&self) -> &str {
        &self.candidate.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_prefers_typical() {
        let mut c = CandidateRecord::new("Seed Fund", "https://x.gov.in");
        assert_eq!(c.amount(), None);
        c.max_ticket_lakh = Some(100.0);
        assert_eq!(c.amount(), Some(100.0));
        c.typical_ticket_lakh = Some(60.0);
        assert_eq!(c.amount(), Some(60.0));
    }

    #[test]
    fn test_clear_deadline_requires_known_type() {
        let c = CandidateRecord::new("Seed Fund", "https://x.gov.in")
            .with_deadline("2026-12-31", DeadlineType::Unknown);
        assert!(!c.has_clear_deadline());

        let c = c.with_deadline("2026-12-31", DeadlineType::BatchCall);
        assert!(c.has_clear_deadline());
    }

    #[test]
    fn test_vetted_record_round_trips_flattened_candidate() {
        let candidate = CandidateRecord::new("Seed Fund", "https://x.gov.in")
            .with_agency("DPIIT")
            .with_amount(60.0);
        let vetted = VettedRecord::from_candidate(candidate.clone());

        let json = serde_json::to_value(&vetted).unwrap();
        assert_eq!(json["title"], "Seed Fund");
        assert_eq!(json["status"], "live");

        let back: VettedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.candidate, candidate);
        assert_eq!(back.id, candidate.id());
    }

    #[test]
    fn test_unknown_enum_values_are_tolerated() {
        let c: CandidateRecord = serde_json::from_str(
            r#"{"title":"X","source_url":"https://a","deadline_type":"quarterly","extraction_method":"ocr"}"#,
        )
        .unwrap();
        assert_eq!(c.deadline_type, DeadlineType::Unknown);
        assert_eq!(c.extraction_method, ExtractionMethod::Unknown);
    }
}
