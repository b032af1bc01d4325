//! Eligibility matching between a record and a requester profile.
//!
//! Every sub-criterion scores in [0, 1]. Missing data on either side gets
//! neutral partial credit, never zero. The result ranks records; callers
//! pick their own cutoff.

use crate::text::normalize;
use crate::types::{CriterionScores, EligibilityMatch, RequesterProfile, VettedRecord};

use super::confidence::round2;

/// Sub-criteria below this are reported with a suggestion.
pub const WELL_MATCHED: f64 = 0.5;

/// Fixed weights; they sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriterionWeights {
    pub stage: f64,
    pub sector: f64,
    pub location: f64,
    pub funding: f64,
    pub company_age: f64,
    pub team_size: f64,
    pub special_criteria: f64,
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            stage: 0.25,
            sector: 0.20,
            location: 0.15,
            funding: 0.15,
            company_age: 0.10,
            team_size: 0.10,
            special_criteria: 0.05,
        }
    }
}

impl CriterionWeights {
    fn weigh(&self, s: &CriterionScores) -> f64 {
        s.stage * self.stage
            + s.sector * self.sector
            + s.location * self.location
            + s.funding * self.funding
            + s.company_age * self.company_age
            + s.team_size * self.team_size
            + s.special_criteria * self.special_criteria
    }
}

/// Stage families in growth order.
const STAGES: &[(&str, &[&str])] = &[
    ("ideation", &["idea", "concept", "ideation", "pre-seed"]),
    (
        "mvp_prototype",
        &["mvp", "prototype", "poc", "proof of concept", "pilot"],
    ),
    ("early_stage", &["early", "seed", "pre-series", "validation"]),
    (
        "growth_stage",
        &["growth", "series", "scale", "expansion", "mature"],
    ),
];

const SECTORS: &[(&str, &[&str])] = &[
    (
        "technology",
        &["tech", "software", "it", "digital", "ai", "ml", "iot"],
    ),
    (
        "healthcare",
        &["health", "medical", "pharma", "biotech", "life sciences"],
    ),
    ("fintech", &["finance", "banking", "payments", "insurance"]),
    ("agritech", &["agriculture", "farming", "food", "agri"]),
    (
        "cleantech",
        &["clean", "green", "renewable", "sustainability", "climate"],
    ),
    ("edtech", &["education", "learning", "training"]),
    ("mobility", &["transport", "automotive", "logistics", "mobility"]),
];

const REGIONS: &[&str] = &["north", "south", "east", "west"];

/// Whether normalized `text` mentions `keyword`.
///
/// Single-word keywords match as a word prefix ("tech" in "technology");
/// phrases match on word boundaries.
fn mentions(text: &str, keyword: &str) -> bool {
    let keyword = normalize(keyword);
    if keyword.contains(' ') {
        format!(" {} ", text).contains(&format!(" {} ", keyword))
    } else {
        text.split(' ').any(|word| word.starts_with(&keyword))
    }
}

/// Indices of every family `text` belongs to.
fn families(text: &str, table: &[(&str, &[&str])]) -> Vec<usize> {
    let text = normalize(text);
    table
        .iter()
        .enumerate()
        .filter(|(_, (name, keywords))| {
            mentions(&text, name) || keywords.iter().any(|k| mentions(&text, k))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Scores records against a requester profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityMatcher {
    weights: CriterionWeights,
}

impl EligibilityMatcher {
    pub fn new(weights: CriterionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CriterionWeights {
        &self.weights
    }

    pub fn match_record(&self, record: &VettedRecord, profile: &RequesterProfile) -> EligibilityMatch {
        let criteria = &record.eligibility_criteria;

        let breakdown = CriterionScores {
            stage: stage_score(profile.stage.as_deref(), criteria.stage.as_deref()),
            sector: sector_score(&profile.sectors, &criteria.sectors),
            location: location_score(
                profile.location.as_deref(),
                criteria.location_scope.as_deref(),
            ),
            funding: funding_score(
                profile.funding_needed_lakh,
                criteria.typical_ticket_lakh,
                criteria.min_ticket_lakh,
                criteria.max_ticket_lakh,
            ),
            company_age: age_score(
                profile.company_age_years,
                criteria.company_age_min,
                criteria.company_age_max,
            ),
            team_size: size_score(
                profile.team_size,
                profile.revenue_lakh,
                criteria.team_size_max,
                criteria.revenue_max_lakh,
            ),
            special_criteria: special_score(profile, &criteria.flags),
        };

        let score = round2(self.weights.weigh(&breakdown).clamp(0.0, 1.0));
        EligibilityMatch {
            score,
            reasons: suggestions(&breakdown, record),
            breakdown,
        }
    }
}

fn stage_score(profile: Option<&str>, record: Option<&str>) -> f64 {
    let (Some(profile), Some(record)) = (profile, record) else {
        return 0.5;
    };
    let clean = |s: &str| s.trim().to_lowercase().replace(' ', "_");
    if clean(profile) == clean(record) {
        return 1.0;
    }

    let ours = families(profile, STAGES);
    let theirs = families(record, STAGES);
    if ours.iter().any(|f| theirs.contains(f)) {
        return 0.8;
    }

    match (ours.first(), theirs.first()) {
        (Some(a), Some(b)) => match a.abs_diff(*b) {
            1 => 0.6,
            2 => 0.3,
            _ => 0.1,
        },
        _ => 0.1,
    }
}

fn sector_score(profile: &[String], record: &[String]) -> f64 {
    if profile.is_empty() || record.is_empty() {
        return 0.5;
    }
    let ours: Vec<String> = profile.iter().map(|s| normalize(s)).collect();
    let theirs: Vec<String> = record.iter().map(|s| normalize(s)).collect();

    let direct = ours.iter().filter(|s| theirs.contains(s)).count();
    if direct > 0 {
        return (direct as f64 / ours.len() as f64).min(1.0);
    }

    let same_family = ours.iter().any(|a| {
        let fa = families(a, SECTORS);
        theirs
            .iter()
            .any(|b| families(b, SECTORS).iter().any(|f| fa.contains(f)))
    });
    if same_family {
        0.7
    } else {
        0.0
    }
}

fn location_score(profile: Option<&str>, scope: Option<&str>) -> f64 {
    let (Some(profile), Some(scope)) = (profile, scope) else {
        return 0.5;
    };
    let profile = profile.trim().to_lowercase();
    let scope = scope.trim().to_lowercase();

    if scope.contains("national") || scope.contains("india") {
        1.0
    } else if scope.contains(&profile) || profile.contains(&scope) {
        1.0
    } else if REGIONS.iter().any(|r| scope.contains(r)) {
        0.3
    } else {
        0.1
    }
}

fn funding_score(
    need: Option<f64>,
    typical: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> f64 {
    let Some(need) = need.filter(|n| *n > 0.0) else {
        return 0.5;
    };
    let positive = |v: Option<f64>| v.filter(|x| *x > 0.0);
    let (typical, min, max) = (positive(typical), positive(min), positive(max));

    if let (Some(lo), Some(hi)) = (min, max) {
        if (lo..=hi).contains(&need) {
            return 1.0;
        }
    }

    let target = match (typical, min, max) {
        (Some(t), _, _) => t,
        (None, Some(lo), Some(hi)) => (lo + hi) / 2.0,
        (None, _, Some(hi)) => hi,
        _ => return 0.5,
    };

    let ratio = need.min(target) / need.max(target);
    if ratio >= 0.8 {
        1.0
    } else if ratio >= 0.6 {
        0.8
    } else if ratio >= 0.4 {
        0.6
    } else if ratio >= 0.2 {
        0.4
    } else {
        0.2
    }
}

fn age_score(age: Option<f64>, min: Option<f64>, max: Option<f64>) -> f64 {
    let Some(age) = age.filter(|a| *a > 0.0) else {
        return 0.5;
    };
    let Some(max) = max else {
        return 0.8;
    };
    let min = min.unwrap_or(0.0);

    if age < min {
        0.3
    } else if age <= max {
        1.0
    } else {
        (0.8 - (age - max) * 0.1).max(0.1)
    }
}

fn size_score(
    team: Option<u32>,
    revenue: Option<f64>,
    team_max: Option<u32>,
    revenue_max: Option<f64>,
) -> f64 {
    let mut scores = Vec::with_capacity(2);

    if let (Some(team), Some(max)) = (team.filter(|t| *t > 0), team_max.filter(|m| *m > 0)) {
        if team <= max {
            scores.push(1.0);
        } else {
            let excess = team as f64 / max as f64;
            scores.push((1.0 - (excess - 1.0) * 0.5).max(0.1));
        }
    }

    if let (Some(revenue), Some(max)) = (
        revenue.filter(|r| *r > 0.0),
        revenue_max.filter(|m| *m > 0.0),
    ) {
        if revenue <= max {
            scores.push(1.0);
        } else {
            let excess = revenue / max;
            scores.push((1.0 - (excess - 1.0) * 0.3).max(0.1));
        }
    }

    if scores.is_empty() {
        0.5
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Credit for a recognised flag the requester has not answered.
const UNANSWERED_CREDIT: f64 = 0.5;

/// Average credit over the recognised flags.
///
/// Flags that name nothing we can check are ignored. An unanswered profile
/// flag earns partial credit.
fn special_score(profile: &RequesterProfile, flags: &[String]) -> f64 {
    let founder_reserved = profile
        .founder_category
        .as_deref()
        .map(|c| matches!(c.trim().to_lowercase().as_str(), "sc" | "st"));

    let credits: Vec<f64> = flags
        .iter()
        .filter_map(|flag| {
            let lower = flag.to_lowercase();
            let words = normalize(flag);
            let answer = if lower.contains("dpiit") {
                profile.dpiit_recognized
            } else if lower.contains("women") {
                profile.women_led
            } else if words.split(' ').any(|w| w == "sc" || w == "st") {
                founder_reserved
            } else if lower.contains("first_time") || words.contains("first time") {
                profile.first_time_entrepreneur
            } else {
                return None;
            };
            Some(match answer {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => UNANSWERED_CREDIT,
            })
        })
        .collect();

    if credits.is_empty() {
        1.0
    } else {
        credits.iter().sum::<f64>() / credits.len() as f64
    }
}

fn suggestions(s: &CriterionScores, record: &VettedRecord) -> Vec<String> {
    let c = &record.eligibility_criteria;
    let mut out = Vec::new();

    if s.stage < WELL_MATCHED {
        out.push(format!(
            "Consider applying when your startup reaches the {} stage",
            c.stage.as_deref().unwrap_or("required")
        ));
    }
    if s.sector < WELL_MATCHED {
        out.push(format!(
            "This grant focuses on {} sectors",
            c.sectors.join(", ")
        ));
    }
    if s.location < WELL_MATCHED {
        out.push(format!(
            "This grant is limited to {}",
            c.location_scope.as_deref().unwrap_or("specific regions")
        ));
    }
    if s.funding < WELL_MATCHED {
        let bound = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |x| format!("{x}"));
        out.push(format!(
            "Grant funding range is ₹{}L - ₹{}L",
            bound(c.min_ticket_lakh),
            bound(c.max_ticket_lakh)
        ));
    }
    if s.company_age < WELL_MATCHED {
        out.push(match c.company_age_max {
            Some(max) => format!("Company age must be within {} years", max),
            None => "Check the company age requirement".to_string(),
        });
    }
    if s.team_size < WELL_MATCHED {
        out.push("Team size or revenue exceeds the grant's target audience".to_string());
    }
    if s.special_criteria < WELL_MATCHED {
        out.push(format!(
            "Review special eligibility criteria carefully: {}",
            c.flags.join(", ")
        ));
    }
    out
}
