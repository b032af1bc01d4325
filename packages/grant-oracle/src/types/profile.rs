//! Requester profile used for eligibility scoring.

use serde::{Deserialize, Serialize};

/// Describes the startup asking "which grants fit me?".
///
/// Read-only input; the oracle never stores it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequesterProfile {
    /// Stage (e.g. "ideation", "mvp", "early_stage", "growth")
    pub stage: Option<String>,
    pub sectors: Vec<String>,
    /// State or region the company is registered in
    pub location: Option<String>,
    pub funding_needed_lakh: Option<f64>,
    pub company_age_years: Option<f64>,
    pub team_size: Option<u32>,
    pub revenue_lakh: Option<f64>,
    /// Recognition flags; `None` when the requester did not say
    pub dpiit_recognized: Option<bool>,
    pub women_led: Option<bool>,
    /// Founder category (e.g. "sc", "st")
    pub founder_category: Option<String>,
    pub first_time_entrepreneur: Option<bool>,
}
