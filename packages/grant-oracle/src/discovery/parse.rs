//! Turning backend output into candidate records.
//!
//! Backends wrap JSON in prose or code fences, write numbers as strings,
//! and use one string where a list was asked for. Parsing tolerates all of
//! that, but an answer with no recognisable payload is an error, never an
//! empty success.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::ExtractionError;
use crate::types::{
    CandidateRecord, DeadlineType, DiscoveryTask, ExtractionMethod, OperationKind,
    TargetAudience,
};

/// One grant as a backend writes it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractedGrant {
    #[serde(alias = "name")]
    title: Option<String>,
    agency: Option<String>,
    bucket: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    instrument: Vec<String>,
    #[serde(deserialize_with = "lenient_f64")]
    min_ticket_lakh: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max_ticket_lakh: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    typical_ticket_lakh: Option<f64>,
    deadline_type: Option<String>,
    #[serde(alias = "deadline")]
    next_deadline_iso: Option<String>,
    #[serde(alias = "eligibility_text")]
    eligibility: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    eligibility_flags: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    sector_tags: Vec<String>,
    state_scope: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    company_age_min_years: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    company_age_max_years: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    team_size_max: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    revenue_max_lakh: Option<f64>,
    #[serde(alias = "url")]
    source_url: Option<String>,
}

/// Parse a backend answer into candidates for `task`.
///
/// An empty `grants` array is a valid "nothing found" answer.
pub fn parse_candidates(
    text: &str,
    task: &DiscoveryTask,
) -> Result<Vec<CandidateRecord>, ExtractionError> {
    let payload = locate_json(text).ok_or(ExtractionError::NoPayload)?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("grants") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(ExtractionError::Malformed(
                    "`grants` is not an array".into(),
                ))
            }
            None if map.contains_key("title") => vec![Value::Object(map)],
            None => {
                return Err(ExtractionError::Malformed(
                    "expected a `grants` array".into(),
                ))
            }
        },
        _ => {
            return Err(ExtractionError::Malformed(
                "expected a JSON object or array".into(),
            ))
        }
    };

    let total = entries.len();
    let mut candidates = Vec::with_capacity(total);
    for entry in entries {
        let grant: ExtractedGrant = serde_json::from_value(entry)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        match into_candidate(grant, task) {
            Some(candidate) => candidates.push(candidate),
            None => warn!(target = %task.target, "Skipping extracted grant without a title"),
        }
    }

    if total > 0 && candidates.is_empty() {
        return Err(ExtractionError::Malformed(
            "no extracted grant has a title".into(),
        ));
    }
    Ok(candidates)
}

fn into_candidate(grant: ExtractedGrant, task: &DiscoveryTask) -> Option<CandidateRecord> {
    let title = non_blank(grant.title)?;

    let extraction_method = match task.kind {
        OperationKind::ExtractPdf => ExtractionMethod::Pdf,
        OperationKind::Discover | OperationKind::Validate => ExtractionMethod::Structured,
    };

    let audience = TargetAudience {
        company_age_min: grant.company_age_min_years,
        company_age_max: grant.company_age_max_years,
        team_size_max: grant.team_size_max.map(|n| n.round().max(0.0) as u32),
        revenue_max_lakh: grant.revenue_max_lakh,
    };
    let target_audience = (audience != TargetAudience::default()).then_some(audience);

    Some(CandidateRecord {
        title,
        agency: non_blank(grant.agency),
        min_ticket_lakh: grant.min_ticket_lakh,
        max_ticket_lakh: grant.max_ticket_lakh,
        typical_ticket_lakh: grant.typical_ticket_lakh,
        deadline: non_blank(grant.next_deadline_iso),
        deadline_type: grant
            .deadline_type
            .as_deref()
            .map(parse_deadline_type)
            .unwrap_or_default(),
        eligibility_text: non_blank(grant.eligibility),
        eligibility_flags: grant.eligibility_flags,
        sector_tags: grant.sector_tags,
        state_scope: non_blank(grant.state_scope),
        bucket: non_blank(grant.bucket),
        instrument: grant.instrument,
        target_audience,
        source_url: non_blank(grant.source_url)
            .unwrap_or_else(|| task.target.as_str().to_string()),
        extraction_method,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn parse_deadline_type(raw: &str) -> DeadlineType {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "rolling" | "open" | "ongoing" => DeadlineType::Rolling,
        "batch_call" | "batch" | "call" => DeadlineType::BatchCall,
        "annual" | "yearly" => DeadlineType::Annual,
        "closed_waitlist" | "waitlist" | "closed" => DeadlineType::ClosedWaitlist,
        _ => DeadlineType::Unknown,
    }
}

/// Find the JSON payload in free text: a fenced block, else the outermost
/// braces or brackets.
fn locate_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let fenced = body[..end].trim();
            if fenced.starts_with('{') || fenced.starts_with('[') {
                return Some(fenced);
            }
        }
    }

    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DiscoveryTask {
        DiscoveryTask::discover("https://seedfund.startupindia.gov.in/")
    }

    #[test]
    fn test_parses_fenced_payload() {
        let text = r#"Here is what I found:
```json
{"grants": [{"title": "Startup India Seed Fund Scheme", "agency": "DPIIT",
  "max_ticket_lakh": "50", "deadline_type": "rolling", "sector_tags": "All, Tech"}]}
```
Let me know if you need more."#;

        let candidates = parse_candidates(text, &task()).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.title, "Startup India Seed Fund Scheme");
        assert_eq!(c.agency.as_deref(), Some("DPIIT"));
        assert_eq!(c.max_ticket_lakh, Some(50.0));
        assert_eq!(c.deadline_type, DeadlineType::Rolling);
        assert_eq!(c.sector_tags, vec!["All", "Tech"]);
        assert_eq!(c.source_url, "https://seedfund.startupindia.gov.in/");
        assert_eq!(c.extraction_method, ExtractionMethod::Structured);
    }

    #[test]
    fn test_parses_bare_array_with_prose() {
        let text = r#"Result: [{"title": "BIG", "next_deadline_iso": "2026-12-31",
            "deadline_type": "batch call", "source_url": "https://birac.nic.in/big"}] done"#;
        let candidates = parse_candidates(text, &task()).unwrap();
        assert_eq!(candidates[0].deadline.as_deref(), Some("2026-12-31"));
        assert_eq!(candidates[0].deadline_type, DeadlineType::BatchCall);
        assert_eq!(candidates[0].source_url, "https://birac.nic.in/big");
    }

    #[test]
    fn test_empty_grants_is_success() {
        let candidates = parse_candidates(r#"{"grants": []}"#, &task()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_missing_payload_is_error() {
        let err = parse_candidates("I could not find any grants on that page.", &task())
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoPayload));
    }

    #[test]
    fn test_broken_json_is_malformed() {
        let err = parse_candidates(r#"{"grants": [{"title": "X",}"#, &task()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));

        let err = parse_candidates(r#"{"results": []}"#, &task()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_untitled_entries_are_dropped_not_invented() {
        let text = r#"{"grants": [{"title": ""}, {"title": "Seed Fund", "team_size_max": 10}]}"#;
        let candidates = parse_candidates(text, &task()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].target_audience.as_ref().and_then(|a| a.team_size_max),
            Some(10)
        );

        let err = parse_candidates(r#"{"grants": [{"agency": "DST"}]}"#, &task()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_pdf_tasks_mark_method() {
        let task = DiscoveryTask::extract_pdf("calls/birac.txt");
        let candidates = parse_candidates(r#"{"grants":[{"title":"BIG"}]}"#, &task).unwrap();
        assert_eq!(candidates[0].extraction_method, ExtractionMethod::Pdf);
        assert_eq!(candidates[0].source_url, "calls/birac.txt");
        assert!(candidates[0].target_audience.is_none());
    }
}
