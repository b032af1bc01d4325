//! Application complexity estimation.

use std::collections::BTreeMap;

use crate::types::{
    ComplexityAssessment, ComplexityLevel, DeadlineType, FactorScore, VettedRecord,
};

use super::confidence::round2;

const DOCUMENT_WEIGHT: f64 = 0.25;
const STAGES_WEIGHT: f64 = 0.20;
const EVALUATION_WEIGHT: f64 = 0.20;
const TIMELINE_WEIGHT: f64 = 0.15;
const CRITERIA_WEIGHT: f64 = 0.10;
const FUNDING_WEIGHT: f64 = 0.10;

/// Factors at or above this score are called out in the reasons.
const HIGH_FACTOR: f64 = 0.7;

const DOCUMENT_KEYWORDS: &[(ComplexityLevel, &[&str])] = &[
    (
        ComplexityLevel::Simple,
        &["application form", "basic info", "pitch deck"],
    ),
    (
        ComplexityLevel::Medium,
        &["business plan", "financial statements", "references"],
    ),
    (
        ComplexityLevel::Complex,
        &["detailed projections", "technical specs", "certificates"],
    ),
    (
        ComplexityLevel::VeryComplex,
        &["audited financials", "regulatory approvals", "patents"],
    ),
];

fn level_score(level: ComplexityLevel) -> f64 {
    match level {
        ComplexityLevel::Simple => 0.2,
        ComplexityLevel::Medium => 0.4,
        ComplexityLevel::Complex => 0.7,
        ComplexityLevel::VeryComplex => 1.0,
    }
}

fn factor(level: ComplexityLevel, details: String) -> FactorScore {
    FactorScore {
        score: level_score(level),
        level,
        details,
    }
}

/// Estimates how much work an application takes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityEstimator;

impl ComplexityEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, record: &VettedRecord) -> ComplexityAssessment {
        let candidate = &record.candidate;
        let amount = candidate.amount().unwrap_or(0.0);

        let factors = [
            ("document_requirements", documents(&candidate.eligibility_flags), DOCUMENT_WEIGHT),
            ("application_stages", stages(amount), STAGES_WEIGHT),
            (
                "evaluation_process",
                evaluation(candidate.agency.as_deref(), amount),
                EVALUATION_WEIGHT,
            ),
            ("timeline_duration", timeline(candidate.deadline_type), TIMELINE_WEIGHT),
            (
                "eligibility_criteria",
                criteria(candidate.eligibility_flags.len()),
                CRITERIA_WEIGHT,
            ),
            ("funding_amount", funding(amount), FUNDING_WEIGHT),
        ];

        let total: f64 = factors.iter().map(|(_, f, w)| f.score * w).sum();
        let level = ComplexityLevel::from_score(total);

        let mut reasons: Vec<String> = factors
            .iter()
            .filter(|(_, f, _)| f.score >= HIGH_FACTOR)
            .map(|(name, f, _)| format!("High {}: {}", name.replace('_', " "), f.details))
            .collect();
        if reasons.is_empty() {
            reasons.push("Standard application process with moderate requirements".to_string());
        }

        ComplexityAssessment {
            level,
            score: round2(total),
            estimated_effort_hours: level.estimated_effort_hours(),
            factors: factors
                .into_iter()
                .map(|(name, f, _)| (name.to_string(), f))
                .collect::<BTreeMap<_, _>>(),
            reasons,
        }
    }
}

fn documents(flags: &[String]) -> FactorScore {
    let mut level = ComplexityLevel::Simple;
    let mut count = 0;
    for flag in flags {
        let lower = flag.to_lowercase();
        for (candidate_level, keywords) in DOCUMENT_KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                level = level.max(*candidate_level);
                count += 1;
            }
        }
    }
    factor(level, format!("Estimated {} document types required", count))
}

fn stages(amount: f64) -> FactorScore {
    let (count, level) = if amount < 10.0 {
        (1, ComplexityLevel::Simple)
    } else if amount < 50.0 {
        (2, ComplexityLevel::Medium)
    } else if amount < 200.0 {
        (3, ComplexityLevel::Complex)
    } else {
        (4, ComplexityLevel::VeryComplex)
    };
    factor(level, format!("Estimated {} application stages", count))
}

fn evaluation(agency: Option<&str>, amount: f64) -> FactorScore {
    let agency = agency.unwrap_or_default().to_lowercase();
    let level = if agency.contains("government") || agency.contains("ministry") {
        if amount > 100.0 {
            ComplexityLevel::VeryComplex
        } else {
            ComplexityLevel::Complex
        }
    } else if amount > 50.0 {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::Simple
    };
    factor(
        level,
        "Evaluation complexity based on agency type and funding amount".to_string(),
    )
}

fn timeline(kind: DeadlineType) -> FactorScore {
    let days = match kind {
        DeadlineType::Rolling => 45,
        DeadlineType::BatchCall => 120,
        DeadlineType::Annual => 180,
        _ => 90,
    };
    let level = if days <= 30 {
        ComplexityLevel::Simple
    } else if days <= 90 {
        ComplexityLevel::Medium
    } else if days <= 180 {
        ComplexityLevel::Complex
    } else {
        ComplexityLevel::VeryComplex
    };
    factor(level, format!("Estimated {} days process duration", days))
}

fn criteria(count: usize) -> FactorScore {
    let level = match count {
        0..=3 => ComplexityLevel::Simple,
        4..=6 => ComplexityLevel::Medium,
        7..=10 => ComplexityLevel::Complex,
        _ => ComplexityLevel::VeryComplex,
    };
    factor(level, format!("{} eligibility criteria", count))
}

fn funding(amount: f64) -> FactorScore {
    let level = if amount <= 10.0 {
        ComplexityLevel::Simple
    } else if amount <= 50.0 {
        ComplexityLevel::Medium
    } else if amount <= 200.0 {
        ComplexityLevel::Complex
    } else {
        ComplexityLevel::VeryComplex
    };
    factor(level, format!("₹{}L funding amount", amount))
}
