//! Confidence scoring with data lineage.
//!
//! Deterministic: the same candidate always yields the same score and the
//! same lineage. Nothing time-dependent is recorded.

use std::collections::BTreeMap;

use url::Url;

use crate::types::{
    CandidateRecord, DataLineage, ExtractionMethod, SourceType, VettedRecord,
};

const DEADLINE_BONUS: f64 = 0.1;
const AMOUNT_BONUS: f64 = 0.1;
const ELIGIBILITY_BONUS: f64 = 0.05;
const MULTI_SOURCE_BONUS: f64 = 0.1;
const STRUCTURED_BONUS: f64 = 0.1;
const PDF_PENALTY: f64 = 0.1;

const SOCIAL_HOSTS: &[&str] = &[
    "facebook", "twitter", "x.com", "linkedin", "instagram", "youtube",
];
const BLOG_HOSTS: &[&str] = &["blog", "medium.com", "wordpress", "substack"];
const NEWS_HOSTS: &[&str] = &[
    "news",
    "times",
    "hindu",
    "economictimes",
    "business-standard",
    "livemint",
    "moneycontrol",
    "yourstory",
    "inc42",
];

/// Classify a source by the host of its URL.
///
/// Document paths and unparseable references are `Unknown`.
pub fn classify_source(source: &str) -> SourceType {
    let Some(host) = Url::parse(source)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
    else {
        return SourceType::Unknown;
    };

    if host.ends_with(".gov.in") || host.ends_with(".nic.in") {
        SourceType::OfficialPortal
    } else if host.contains(".gov.")
        || host.ends_with(".gov")
        || host.contains("government")
        || host.contains("ministry")
    {
        SourceType::GovernmentWebsite
    } else if SOCIAL_HOSTS.iter().any(|s| host.contains(s)) {
        SourceType::SocialMedia
    } else if BLOG_HOSTS.iter().any(|s| host.contains(s)) {
        SourceType::BlogPost
    } else if NEWS_HOSTS.iter().any(|s| host.contains(s)) {
        SourceType::NewsArticle
    } else {
        SourceType::Unknown
    }
}

/// Scores how far a record can be trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a single-source candidate.
    pub fn score(&self, candidate: &CandidateRecord) -> (f64, DataLineage) {
        let lineage = self.assess(candidate, 1);
        (lineage.final_score, lineage)
    }

    /// Score a vetted record in place, counting all of its sources.
    pub fn apply(&self, record: &mut VettedRecord) {
        let lineage = self.assess(&record.candidate, record.source_urls.len());
        record.confidence = lineage.final_score;
        record.data_lineage = lineage;
    }

    fn assess(&self, candidate: &CandidateRecord, source_count: usize) -> DataLineage {
        let source_type = classify_source(&candidate.source_url);
        let method = candidate.extraction_method;
        let base_score = source_type.base_score();

        let mut score = base_score;
        let mut quality_indicators = Vec::new();
        let mut confidence_factors = Vec::new();
        let mut modify = |applies: bool, delta: f64, indicator: &str, factor: &str| {
            if applies {
                score += delta;
                quality_indicators.push(indicator.to_string());
                confidence_factors.push(format!("{}:{:+.2}", factor, delta));
            }
        };

        modify(
            candidate.has_clear_deadline(),
            DEADLINE_BONUS,
            "clear_deadline_found",
            "deadline_present",
        );
        modify(
            candidate.amount().is_some(),
            AMOUNT_BONUS,
            "funding_amount_found",
            "amount_present",
        );
        modify(
            !candidate.eligibility_flags.is_empty(),
            ELIGIBILITY_BONUS,
            "eligibility_criteria_found",
            "eligibility_present",
        );
        modify(
            source_count > 1,
            MULTI_SOURCE_BONUS,
            "multiple_sources",
            "multi_source",
        );
        modify(
            method.is_structured(),
            STRUCTURED_BONUS,
            "structured_extraction",
            "structured_origin",
        );
        modify(
            method == ExtractionMethod::Pdf,
            -PDF_PENALTY,
            "pdf_extraction",
            "pdf_origin",
        );

        let final_score = round2(score.clamp(0.0, 1.0));

        DataLineage {
            source_type,
            extraction_method: method,
            quality_indicators,
            confidence_factors,
            data_completeness: completeness(candidate),
            base_score,
            final_score,
        }
    }
}

fn completeness(candidate: &CandidateRecord) -> BTreeMap<String, bool> {
    [
        ("title", !candidate.title.trim().is_empty()),
        ("agency", candidate.agency.is_some()),
        ("amount", candidate.amount().is_some()),
        ("deadline", candidate.deadline.is_some()),
        (
            "eligibility",
            candidate.eligibility_text.is_some() || !candidate.eligibility_flags.is_empty(),
        ),
        ("sector", !candidate.sector_tags.is_empty()),
        ("location", candidate.state_scope.is_some()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeadlineType;

    fn rich(url: &str) -> CandidateRecord {
        CandidateRecord::new("Seed Fund", url)
            .with_agency("DPIIT")
            .with_amount(50.0)
            .with_deadline("2026-12-31", DeadlineType::BatchCall)
            .with_method(ExtractionMethod::Structured)
    }

    #[test]
    fn test_classify_source() {
        assert_eq!(
            classify_source("https://seedfund.startupindia.gov.in/"),
            SourceType::OfficialPortal
        );
        assert_eq!(classify_source("https://birac.nic.in/big"), SourceType::OfficialPortal);
        assert_eq!(classify_source("https://www.gov.uk/x"), SourceType::GovernmentWebsite);
        assert_eq!(
            classify_source("https://economictimes.indiatimes.com/a"),
            SourceType::NewsArticle
        );
        assert_eq!(classify_source("https://founders.medium.com/p"), SourceType::BlogPost);
        assert_eq!(classify_source("https://www.linkedin.com/posts/1"), SourceType::SocialMedia);
        assert_eq!(classify_source("docs/call.pdf"), SourceType::Unknown);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = ConfidenceScorer::new();
        let candidate = rich("https://seedfund.startupindia.gov.in/");
        assert_eq!(scorer.score(&candidate), scorer.score(&candidate));
    }

    #[test]
    fn test_official_rich_beats_blog_without_deadline() {
        let scorer = ConfidenceScorer::new();
        let (official, _) = scorer.score(&rich("https://seedfund.startupindia.gov.in/"));

        let mut blog = rich("https://grants.wordpress.com/seed");
        blog.deadline = None;
        blog.deadline_type = DeadlineType::Unknown;
        let (blog_score, lineage) = scorer.score(&blog);

        assert!(official > blog_score);
        assert_eq!(official, 1.0);
        assert_eq!(lineage.source_type, SourceType::BlogPost);
        assert_eq!(blog_score, 0.6);
    }

    #[test]
    fn test_pdf_penalty_and_lineage() {
        let candidate = CandidateRecord::new("BIG", "https://birac.nic.in/big.pdf")
            .with_method(ExtractionMethod::Pdf);
        let (score, lineage) = ConfidenceScorer::new().score(&candidate);

        assert_eq!(score, 0.8);
        assert_eq!(lineage.base_score, 0.9);
        assert_eq!(lineage.quality_indicators, vec!["pdf_extraction"]);
        assert_eq!(lineage.confidence_factors, vec!["pdf_origin:-0.10"]);
        assert_eq!(lineage.data_completeness["amount"], false);
    }

    #[test]
    fn test_multiple_sources_bonus() {
        let mut record = VettedRecord::from_candidate(CandidateRecord::new("X", "https://a.com"));
        let scorer = ConfidenceScorer::new();
        scorer.apply(&mut record);
        let single = record.confidence;

        record.source_urls.push("https://b.com".into());
        scorer.apply(&mut record);
        assert_eq!(record.confidence, round2(single + MULTI_SOURCE_BONUS));
    }
}
