//! Liveness and deadline monitoring.
//!
//! Records are only ever updated, never removed. A passed deadline decides
//! the status outright; otherwise the source page is probed for closed and
//! open signals.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::text::normalize;
use crate::traits::{ProbeOutcome, SourceProber};
use crate::types::{DeadlineStatus, DeadlineType, GrantStatus, VettedRecord};

/// Default interval between two checks of the same record.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const REASON_DEADLINE_PASSED: &str = "deadline_passed";
pub const REASON_APPLICATION_CLOSED: &str = "application_closed";
pub const REASON_APPLICATIONS_OPEN: &str = "applications_open";
pub const REASON_WEBSITE_UNAVAILABLE: &str = "website_unavailable";

const CLOSED_SIGNALS: &[&str] = &[
    "closed",
    "expired",
    "deadline passed",
    "applications closed",
    "no longer accepting",
    "ended",
    "concluded",
    "completed",
    "submissions closed",
    "registration closed",
];

const OPEN_SIGNALS: &[&str] = &[
    "apply now",
    "applications open",
    "accepting applications",
    "submit application",
    "register now",
    "applications are invited",
    "last date to apply",
    "now open",
];

/// What a page says about a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    Closed,
    Open,
    Unclear,
}

/// Scan page text for status signals. Closed outranks open.
pub fn scan_page(content: &str) -> PageSignal {
    let text = format!(" {} ", normalize(content));
    let has = |signals: &[&str]| {
        signals
            .iter()
            .any(|s| text.contains(&format!(" {} ", s)))
    };
    if has(CLOSED_SIGNALS) {
        PageSignal::Closed
    } else if has(OPEN_SIGNALS) {
        PageSignal::Open
    } else {
        PageSignal::Unclear
    }
}

/// Parse a deadline written as RFC 3339 or `YYYY-MM-DD`.
///
/// A bare date means the end of that day (UTC).
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
    Some(date.and_time(end_of_day).and_utc())
}

/// Where `record`'s deadline sits relative to `now`, and whole days left.
pub fn deadline_status(record: &VettedRecord, now: DateTime<Utc>) -> (DeadlineStatus, Option<i64>) {
    let candidate = &record.candidate;
    if candidate.deadline_type == DeadlineType::Rolling {
        return (DeadlineStatus::Rolling, None);
    }
    let Some(raw) = candidate.deadline.as_deref().filter(|d| !d.trim().is_empty()) else {
        return (DeadlineStatus::Unknown, None);
    };
    let Some(deadline) = parse_deadline(raw) else {
        warn!(record_id = %record.id, deadline = raw, "Could not parse deadline");
        return (DeadlineStatus::Unknown, None);
    };

    let remaining = deadline - now;
    let days = remaining.num_seconds().div_euclid(86_400);
    let status = if deadline < now {
        DeadlineStatus::Expired
    } else if days <= 7 {
        DeadlineStatus::ClosingSoon
    } else if days <= 30 {
        DeadlineStatus::OpenNearDeadline
    } else {
        DeadlineStatus::Open
    };
    (status, Some(days))
}

/// One status transition seen during a check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub id: String,
    pub title: String,
    pub from: GrantStatus,
    pub to: GrantStatus,
    pub reason: Option<String>,
}

/// Summary of one monitoring pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub checked: usize,
    /// Records checked recently enough to be left alone
    pub skipped: usize,
    pub probed: usize,
    pub unreachable: usize,
    pub by_status: BTreeMap<GrantStatus, usize>,
    pub by_deadline_status: BTreeMap<DeadlineStatus, usize>,
    pub changes: Vec<StatusChange>,
}

/// Refreshes record status from deadlines and source pages.
#[derive(Debug, Clone, Copy)]
pub struct StatusMonitor {
    refresh_interval: Duration,
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

impl StatusMonitor {
    pub fn new(refresh_interval: Duration) -> Self {
        Self { refresh_interval }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Whether `record` is due for a check at `now`.
    pub fn is_due(&self, record: &VettedRecord, now: DateTime<Utc>) -> bool {
        match record.last_checked {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|age| age >= self.refresh_interval)
                .unwrap_or(false),
        }
    }

    /// Check every due record, updating it in place.
    pub async fn check<'a, I>(
        &self,
        records: I,
        prober: &dyn SourceProber,
        now: DateTime<Utc>,
    ) -> StatusReport
    where
        I: IntoIterator<Item = &'a mut VettedRecord>,
    {
        let mut report = StatusReport::default();

        for record in records {
            if !self.is_due(record, now) {
                report.skipped += 1;
            } else {
                let before = record.status;
                self.check_one(record, prober, now, &mut report).await;
                report.checked += 1;
                *report
                    .by_deadline_status
                    .entry(record.deadline_status)
                    .or_default() += 1;

                if record.status != before {
                    info!(
                        record_id = %record.id,
                        from = %before,
                        to = %record.status,
                        reason = ?record.status_reason,
                        "Record status changed"
                    );
                    report.changes.push(StatusChange {
                        id: record.id.clone(),
                        title: record.title().to_string(),
                        from: before,
                        to: record.status,
                        reason: record.status_reason.clone(),
                    });
                }
            }
            *report.by_status.entry(record.status).or_default() += 1;
        }

        debug!(
            checked = report.checked,
            skipped = report.skipped,
            probed = report.probed,
            changes = report.changes.len(),
            "Status check finished"
        );
        report
    }

    async fn check_one(
        &self,
        record: &mut VettedRecord,
        prober: &dyn SourceProber,
        now: DateTime<Utc>,
        report: &mut StatusReport,
    ) {
        let (deadline_status, days) = deadline_status(record, now);
        record.deadline_status = deadline_status;
        record.days_until_deadline = days;
        record.last_checked = Some(now);

        if deadline_status == DeadlineStatus::Expired {
            record.status = GrantStatus::Expired;
            record.status_reason = Some(REASON_DEADLINE_PASSED.to_string());
            return;
        }
        if record.status == GrantStatus::Expired {
            return;
        }

        let url = record
            .source_urls
            .first()
            .cloned()
            .unwrap_or_else(|| record.candidate.source_url.clone());
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return;
        }

        report.probed += 1;
        match prober.probe(&url).await {
            ProbeOutcome::Content(content) => match scan_page(&content) {
                PageSignal::Closed => {
                    record.status = GrantStatus::Expired;
                    record.status_reason = Some(REASON_APPLICATION_CLOSED.to_string());
                }
                PageSignal::Open => {
                    record.status = GrantStatus::Live;
                    record.status_reason = Some(REASON_APPLICATIONS_OPEN.to_string());
                }
                PageSignal::Unclear => {}
            },
            ProbeOutcome::Unreachable { status } => {
                debug!(record_id = %record.id, url = %url, status, "Source unreachable");
                report.unreachable += 1;
                record.status_reason = Some(REASON_WEBSITE_UNAVAILABLE.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProber;
    use crate::types::CandidateRecord;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(url: &str, deadline: Option<&str>, kind: DeadlineType) -> VettedRecord {
        let mut candidate = CandidateRecord::new("Seed Fund", url);
        candidate.deadline = deadline.map(String::from);
        candidate.deadline_type = kind;
        VettedRecord::from_candidate(candidate)
    }

    #[test]
    fn test_parse_deadline_formats() {
        assert_eq!(
            parse_deadline("2026-06-30"),
            Some(Utc.with_ymd_and_hms(2026, 6, 30, 23, 59, 59).unwrap())
        );
        assert_eq!(
            parse_deadline("2026-06-30T10:00:00+05:30"),
            Some(Utc.with_ymd_and_hms(2026, 6, 30, 4, 30, 0).unwrap())
        );
        assert_eq!(parse_deadline("end of June"), None);
    }

    #[test]
    fn test_deadline_bands() {
        let cases = [
            ("2026-06-05", DeadlineStatus::ClosingSoon),
            ("2026-06-20", DeadlineStatus::OpenNearDeadline),
            ("2026-09-01", DeadlineStatus::Open),
            ("2026-05-31", DeadlineStatus::Expired),
        ];
        for (deadline, expected) in cases {
            let r = record("https://a.gov.in", Some(deadline), DeadlineType::BatchCall);
            assert_eq!(deadline_status(&r, now()).0, expected, "{deadline}");
        }

        let rolling = record("https://a.gov.in", Some("2020-01-01"), DeadlineType::Rolling);
        assert_eq!(deadline_status(&rolling, now()), (DeadlineStatus::Rolling, None));
    }

    #[test]
    fn test_closed_outranks_open() {
        assert_eq!(
            scan_page("Apply now! Applications closed for 2026."),
            PageSignal::Closed
        );
        assert_eq!(scan_page("<b>Apply now</b>"), PageSignal::Open);
        assert_eq!(scan_page("We recommended these startups"), PageSignal::Unclear);
    }

    #[test]
    fn test_mentioning_a_deadline_is_not_an_open_signal() {
        assert_eq!(
            scan_page("Deadline: 31 March. Last date for results is in May."),
            PageSignal::Unclear
        );
        assert_eq!(
            scan_page("Last date to apply: 31 March 2027"),
            PageSignal::Open
        );
    }

    #[tokio::test]
    async fn test_past_deadline_expires_regardless_of_page() {
        let prober = MockProber::new().with_content("https://a.gov.in", "Apply now");
        let mut records = vec![record(
            "https://a.gov.in",
            Some("2026-01-31"),
            DeadlineType::Annual,
        )];

        let report = StatusMonitor::default()
            .check(&mut records, &prober, now())
            .await;

        assert_eq!(records[0].status, GrantStatus::Expired);
        assert_eq!(records[0].status_reason.as_deref(), Some(REASON_DEADLINE_PASSED));
        assert_eq!(records[0].last_checked, Some(now()));
        assert!(prober.calls().is_empty());
        assert_eq!(report.changes.len(), 1);
    }

    #[tokio::test]
    async fn test_probe_outcomes() {
        let prober = MockProber::new()
            .with_content("https://closed.gov.in", "Submissions closed. Thank you.")
            .with_content("https://open.gov.in", "Applications open until further notice")
            .unreachable("https://down.gov.in");
        let mut records = vec![
            record("https://closed.gov.in", None, DeadlineType::Unknown),
            record("https://open.gov.in", None, DeadlineType::Rolling),
            record("https://down.gov.in", None, DeadlineType::Unknown),
        ];

        let report = StatusMonitor::default()
            .check(&mut records, &prober, now())
            .await;

        assert_eq!(records[0].status, GrantStatus::Expired);
        assert_eq!(records[0].status_reason.as_deref(), Some(REASON_APPLICATION_CLOSED));
        assert_eq!(records[1].status, GrantStatus::Live);
        assert_eq!(records[1].deadline_status, DeadlineStatus::Rolling);
        assert_eq!(records[2].status, GrantStatus::Live);
        assert_eq!(records[2].status_reason.as_deref(), Some(REASON_WEBSITE_UNAVAILABLE));
        assert!(records.iter().all(|r| r.last_checked == Some(now())));
        assert_eq!(report.probed, 3);
        assert_eq!(report.unreachable, 1);
        assert_eq!(report.by_status[&GrantStatus::Expired], 1);
    }

    #[tokio::test]
    async fn test_recent_and_expired_records_are_not_probed() {
        let prober = MockProber::new().with_content("https://a.gov.in", "Apply now");
        let mut recent = record("https://a.gov.in", None, DeadlineType::Unknown);
        recent.last_checked = Some(now() - chrono::Duration::hours(2));
        let mut expired = record("https://a.gov.in", None, DeadlineType::Unknown);
        expired.status = GrantStatus::Expired;
        let mut records = vec![recent, expired];

        let report = StatusMonitor::default()
            .check(&mut records, &prober, now())
            .await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.checked, 1);
        assert!(prober.calls().is_empty());
        assert_eq!(records[1].status, GrantStatus::Expired);
        assert_eq!(records[1].last_checked, Some(now()));
    }
}
