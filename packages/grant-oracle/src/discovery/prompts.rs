//! Prompts for the survey and extraction steps of a session.

use crate::backends::Prompt;
use crate::types::{DiscoveryTask, OperationKind};

const DEFAULT_FOCUS: &str = "All startup grants and funding schemes";

const SURVEY_SYSTEM: &str = "You are a research analyst cataloguing Indian startup grants, \
funding schemes and subsidies. You read source material carefully and never invent facts.";

const EXTRACT_SYSTEM: &str = "You convert research notes and source text into structured grant \
records. Respond with a single JSON object and nothing else. Use null for anything the source \
does not state.";

const SCHEMA: &str = r#"{
  "grants": [
    {
      "title": "Grant Title",
      "agency": "Agency Name",
      "bucket": "Ideation|MVP Prototype|Early Stage|Growth|Infra",
      "instrument": ["grant", "loan", "subsidy"],
      "min_ticket_lakh": 0.0,
      "max_ticket_lakh": 0.0,
      "typical_ticket_lakh": 0.0,
      "deadline_type": "rolling|batch_call|annual|closed_waitlist",
      "next_deadline_iso": "YYYY-MM-DD",
      "eligibility": "eligibility as written",
      "eligibility_flags": ["criterion"],
      "sector_tags": ["sector"],
      "state_scope": "national|state name",
      "company_age_max_years": 0.0,
      "team_size_max": 0,
      "revenue_max_lakh": 0.0
    }
  ]
}"#;

/// First exchange: read the source and list what it offers.
pub fn survey(task: &DiscoveryTask, content: &str) -> Prompt {
    let focus = task.focus_area.as_deref().unwrap_or(DEFAULT_FOCUS);
    let (what, looking_for) = match task.kind {
        OperationKind::ExtractPdf => (
            "document",
            "grant names, funding amounts (lakhs or crores), application deadlines, \
eligibility criteria, application procedures and sector specifications",
        ),
        _ => (
            "page",
            "title, funding amount (minimum, maximum, typical), deadline information, \
eligibility criteria, application process and sector or domain focus",
        ),
    };

    let user = format!(
        "Source {what}: {target}\n\
Focus area: {focus}\n\n\
List every grant, funding or scheme opportunity described in the {what} below. \
For each one note its {looking_for}. Quote amounts and dates exactly as written.\n\n\
--- BEGIN {what_upper} ---\n{content}\n--- END {what_upper} ---",
        target = task.target,
        what_upper = what.to_uppercase(),
    );

    Prompt::new(SURVEY_SYSTEM, user)
}

/// Second exchange: turn notes (when present) and source into JSON.
pub fn extract(task: &DiscoveryTask, content: &str, notes: Option<&str>) -> Prompt {
    let instruction = match task.kind {
        OperationKind::Validate => {
            "Validate and normalize the grant data in the source below. Clean the data, \
standardize formats and keep only what the source supports."
        }
        OperationKind::ExtractPdf => {
            "Extract every grant, scheme and subsidy from the document below. \
Convert all amounts to lakhs (1 crore = 100 lakh)."
        }
        OperationKind::Discover => {
            "Extract every grant and funding scheme from the page below. \
Convert all amounts to lakhs (1 crore = 100 lakh)."
        }
    };

    let mut user = format!(
        "Source: {target}\n\n{instruction}\n\nReturn JSON with exactly this shape:\n{SCHEMA}\n",
        target = task.target,
    );
    if let Some(notes) = notes {
        user.push_str("\n--- RESEARCH NOTES ---\n");
        user.push_str(notes);
        user.push('\n');
    }
    user.push_str("\n--- SOURCE ---\n");
    user.push_str(content);

    Prompt::new(EXTRACT_SYSTEM, user).json()
}
