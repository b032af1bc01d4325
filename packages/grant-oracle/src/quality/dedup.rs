//! Fuzzy duplicate detection with connected-component grouping.
//!
//! Two records are the same grant when their cleaned titles and agencies
//! are close and their amounts agree (or one is unknown). A record with no
//! title text or no agency never matches anything. Matches are
//! grouped transitively, so every group has exactly one original and
//! duplicates always point straight at it.

use serde::Serialize;
use tracing::debug;

use super::similarity::{ratio, token_sort_ratio};
use crate::text::{normalize, normalize_without};
use crate::types::VettedRecord;

/// Generic words that say nothing about which grant a title names.
const TITLE_NOISE: &[&str] = &[
    "scheme",
    "fund",
    "grant",
    "grants",
    "startup",
    "innovation",
    "support",
    "programme",
    "program",
    "initiative",
    "challenge",
    "competition",
];

/// Administrative filler in agency names.
const AGENCY_NOISE: &[&str] = &[
    "ministry",
    "department",
    "government",
    "govt",
    "goi",
    "of",
    "india",
];

/// Matching thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupConfig {
    /// Minimum title similarity (0-100)
    pub title_threshold: f64,
    /// Minimum agency similarity (0-100)
    pub agency_threshold: f64,
    /// Largest amount difference, relative to the pair mean
    pub amount_tolerance: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_threshold: 85.0,
            agency_threshold: 80.0,
            amount_tolerance: 0.2,
        }
    }
}

/// One (duplicate → original) link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicatePair {
    pub duplicate_id: String,
    pub duplicate_title: String,
    pub original_id: String,
    pub original_title: String,
}

/// Summary of one deduplication pass over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupReport {
    pub total_records: usize,
    pub unique_records: usize,
    pub duplicates_found: usize,
    /// Duplicates as a share of the batch, 0-1
    pub duplicate_rate: f64,
    pub pairs: Vec<DuplicatePair>,
}

/// Result of deduplicating a batch against stored records.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub report: DedupReport,
    /// Stored records whose links or source URLs changed
    pub updated_existing: Vec<VettedRecord>,
}

/// Pre-cleaned comparison keys for one record.
struct Key {
    title: String,
    agency: Option<String>,
    amount: Option<f64>,
}

impl Key {
    fn of(record: &VettedRecord) -> Self {
        let candidate = &record.candidate;
        Self {
            title: clean(&candidate.title, TITLE_NOISE),
            agency: candidate
                .agency
                .as_deref()
                .map(|a| clean(a, AGENCY_NOISE))
                .filter(|a| !a.is_empty()),
            amount: candidate.amount(),
        }
    }
}

/// Strip `noise`, keeping the plain normalized text when nothing else is left.
fn clean(text: &str, noise: &[&str]) -> String {
    let cleaned = normalize_without(text, noise);
    if cleaned.is_empty() {
        normalize(text)
    } else {
        cleaned
    }
}

/// Where a node of the comparison graph lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Stored(usize),
    Batch(usize),
}

struct Node {
    origin: Origin,
    key: Key,
    confidence: f64,
    /// Already canonical in the store; preferred as a group's original
    anchored: bool,
}

/// Union-find over node indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the lower index as root so grouping follows input order.
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Marks duplicate records and merges their sources into one original.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Whether two records describe the same grant.
    pub fn is_same_grant(&self, a: &VettedRecord, b: &VettedRecord) -> bool {
        self.keys_match(&Key::of(a), &Key::of(b))
    }

    fn keys_match(&self, a: &Key, b: &Key) -> bool {
        if a.title.is_empty() || b.title.is_empty() {
            return false;
        }
        if token_sort_ratio(&a.title, &b.title) < self.config.title_threshold {
            return false;
        }
        let agency_ok = match (&a.agency, &b.agency) {
            (Some(x), Some(y)) => ratio(x, y) >= self.config.agency_threshold,
            _ => false,
        };
        agency_ok && self.amounts_match(a.amount, b.amount)
    }

    fn amounts_match(&self, a: Option<f64>, b: Option<f64>) -> bool {
        match (a, b) {
            (Some(x), Some(y)) => {
                let mean = (x + y) / 2.0;
                mean <= 0.0 || (x - y).abs() / mean <= self.config.amount_tolerance
            }
            _ => true,
        }
    }

    /// Mark duplicates in `batch`, comparing against `existing` too.
    ///
    /// Confidence must already be set. Within a group the original is a
    /// stored canonical record when there is one, otherwise the batch
    /// member with the highest confidence (first seen on ties).
    pub fn deduplicate(&self, batch: &mut [VettedRecord], existing: &[VettedRecord]) -> DedupOutcome {
        let batch_ids: std::collections::HashSet<&str> =
            batch.iter().map(|r| r.id.as_str()).collect();

        // Stored records re-discovered in this batch are superseded by the
        // fresh copy.
        let mut nodes: Vec<Node> = Vec::with_capacity(existing.len() + batch.len());
        for (i, record) in existing.iter().enumerate() {
            if batch_ids.contains(record.id.as_str()) {
                continue;
            }
            nodes.push(Node {
                origin: Origin::Stored(i),
                key: Key::of(record),
                confidence: record.confidence,
                anchored: !record.is_duplicate,
            });
        }
        for (i, record) in batch.iter().enumerate() {
            let supersedes_original = existing
                .iter()
                .any(|e| e.id == record.id && !e.is_duplicate);
            nodes.push(Node {
                origin: Origin::Batch(i),
                key: Key::of(record),
                confidence: record.confidence,
                anchored: supersedes_original,
            });
        }

        let node_of_id = |id: &str| -> Option<usize> {
            nodes.iter().position(|n| match n.origin {
                Origin::Stored(i) => existing[i].id == id,
                Origin::Batch(i) => batch[i].id == id,
            })
        };

        let mut sets = DisjointSet::new(nodes.len());

        // Stored duplicates join their original's group up front.
        for (n, node) in nodes.iter().enumerate() {
            if let Origin::Stored(i) = node.origin {
                if let Some(original) = existing[i].original_id.as_deref() {
                    if existing[i].is_duplicate {
                        if let Some(m) = node_of_id(original) {
                            sets.union(n, m);
                        }
                    }
                }
            }
        }

        for a in 0..nodes.len() {
            for b in (a + 1)..nodes.len() {
                let both_stored = matches!(
                    (nodes[a].origin, nodes[b].origin),
                    (Origin::Stored(_), Origin::Stored(_))
                );
                if both_stored {
                    continue;
                }
                if self.keys_match(&nodes[a].key, &nodes[b].key) {
                    sets.union(a, b);
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of_root: std::collections::HashMap<usize, usize> = Default::default();
        for n in 0..nodes.len() {
            let root = sets.find(n);
            let g = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(n);
        }

        let mut report = DedupReport {
            total_records: batch.len(),
            ..Default::default()
        };
        let mut updated_existing = Vec::new();

        for members in groups.iter().filter(|m| m.len() > 1) {
            if !members
                .iter()
                .any(|&n| matches!(nodes[n].origin, Origin::Batch(_)))
            {
                continue;
            }
            let Some(original) = pick_original(&nodes, members) else {
                continue;
            };

            let mut merged_urls: Vec<String> = Vec::new();
            for &n in std::iter::once(&original).chain(members.iter()) {
                let urls = match nodes[n].origin {
                    Origin::Stored(i) => &existing[i].source_urls,
                    Origin::Batch(i) => &batch[i].source_urls,
                };
                for url in urls {
                    if !merged_urls.contains(url) {
                        merged_urls.push(url.clone());
                    }
                }
            }

            let (original_id, original_title) = match nodes[original].origin {
                Origin::Stored(i) => (existing[i].id.clone(), existing[i].title().to_string()),
                Origin::Batch(i) => (batch[i].id.clone(), batch[i].title().to_string()),
            };

            match nodes[original].origin {
                Origin::Batch(i) => {
                    let record = &mut batch[i];
                    record.is_duplicate = false;
                    record.original_id = None;
                    record.source_urls = merged_urls;
                }
                Origin::Stored(i) => {
                    if existing[i].source_urls != merged_urls {
                        let mut record = existing[i].clone();
                        record.source_urls = merged_urls;
                        updated_existing.push(record);
                    }
                }
            }

            for &n in members.iter().filter(|&&n| n != original) {
                match nodes[n].origin {
                    Origin::Batch(i) => {
                        let record = &mut batch[i];
                        record.is_duplicate = true;
                        record.original_id = Some(original_id.clone());
                        report.pairs.push(DuplicatePair {
                            duplicate_id: record.id.clone(),
                            duplicate_title: record.title().to_string(),
                            original_id: original_id.clone(),
                            original_title: original_title.clone(),
                        });
                    }
                    Origin::Stored(i) => {
                        let stored = &existing[i];
                        if !stored.is_duplicate
                            || stored.original_id.as_deref() != Some(original_id.as_str())
                        {
                            let mut record = stored.clone();
                            record.is_duplicate = true;
                            record.original_id = Some(original_id.clone());
                            updated_existing.push(record);
                        }
                    }
                }
            }
        }

        report.duplicates_found = batch.iter().filter(|r| r.is_duplicate).count();
        report.unique_records = report.total_records - report.duplicates_found;
        report.duplicate_rate = if report.total_records == 0 {
            0.0
        } else {
            report.duplicates_found as f64 / report.total_records as f64
        };

        debug!(
            total = report.total_records,
            duplicates = report.duplicates_found,
            updated_existing = updated_existing.len(),
            "Deduplication finished"
        );

        DedupOutcome {
            report,
            updated_existing,
        }
    }
}

/// Anchored members first, then highest confidence, then first seen.
fn pick_original(nodes: &[Node], members: &[usize]) -> Option<usize> {
    let anchored: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&n| nodes[n].anchored)
        .collect();
    let pool: Vec<usize> = if anchored.is_empty() {
        members
            .iter()
            .copied()
            .filter(|&n| matches!(nodes[n].origin, Origin::Batch(_)))
            .collect()
    } else {
        anchored
    };

    // Members are in node order, which follows input order; `>` keeps the
    // earliest on ties.
    pool.into_iter().reduce(|best, n| {
        if nodes[n].confidence > nodes[best].confidence {
            n
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateRecord;

    fn record(title: &str, agency: &str, amount: f64, url: &str, confidence: f64) -> VettedRecord {
        let mut r = VettedRecord::from_candidate(
            CandidateRecord::new(title, url)
                .with_agency(agency)
                .with_amount(amount),
        );
        r.confidence = confidence;
        r
    }

    #[test]
    fn test_near_identical_records_match() {
        let dedup = Deduplicator::default();
        let a = record("Seed Fund", "DPIIT", 60.0, "https://a.gov.in", 0.9);
        let b = record("Seed Fund Scheme", "DPIIT, GoI", 62.0, "https://b.gov.in", 0.9);
        assert!(dedup.is_same_grant(&a, &b));
    }

    #[test]
    fn test_amount_outside_tolerance_does_not_match() {
        let dedup = Deduplicator::default();
        let a = record("Seed Fund", "DPIIT", 50.0, "https://a.gov.in", 0.9);
        let b = record("Seed Fund", "DPIIT", 100.0, "https://b.gov.in", 0.9);
        assert!(!dedup.is_same_grant(&a, &b));
    }

    #[test]
    fn test_unknown_amount_matches() {
        let dedup = Deduplicator::default();
        let a = record("Seed Fund", "DPIIT", 50.0, "https://a.gov.in", 0.9);
        let mut b = record("Seed Fund", "DPIIT", 0.0, "https://b.gov.in", 0.9);
        b.candidate.typical_ticket_lakh = None;
        assert!(dedup.is_same_grant(&a, &b));
    }

    #[test]
    fn test_different_agencies_do_not_match() {
        let dedup = Deduplicator::default();
        let a = record("Seed Fund", "DPIIT", 50.0, "https://a.gov.in", 0.9);
        let b = record("Seed Fund", "BIRAC", 50.0, "https://b.gov.in", 0.9);
        assert!(!dedup.is_same_grant(&a, &b));
    }

    #[test]
    fn test_transitive_group_has_single_original() {
        // 100~120 and 120~144 are within 20%, 100~144 is not.
        let mut batch = vec![
            record("Seed Fund", "DPIIT", 100.0, "https://a.gov.in", 0.7),
            record("Seed Fund", "DPIIT", 120.0, "https://b.gov.in", 0.9),
            record("Seed Fund", "DPIIT", 144.0, "https://c.gov.in", 0.8),
        ];
        let dedup = Deduplicator::default();
        assert!(!dedup.is_same_grant(&batch[0], &batch[2]));

        let outcome = dedup.deduplicate(&mut batch, &[]);

        let originals: Vec<_> = batch.iter().filter(|r| !r.is_duplicate).collect();
        assert_eq!(originals.len(), 1);
        assert_eq!(originals[0].candidate.source_url, "https://b.gov.in");
        assert_eq!(originals[0].source_urls.len(), 3);

        for dup in batch.iter().filter(|r| r.is_duplicate) {
            let target = batch
                .iter()
                .find(|r| Some(&r.id) == dup.original_id.as_ref())
                .unwrap();
            assert!(!target.is_duplicate);
        }
        assert_eq!(outcome.report.duplicates_found, 2);
        assert!((outcome.report.duplicate_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_tie_keeps_first_seen() {
        let mut batch = vec![
            record("Seed Fund", "DPIIT", 60.0, "https://a.gov.in", 0.9),
            record("Seed Fund Scheme", "DPIIT", 60.0, "https://b.gov.in", 0.9),
        ];
        Deduplicator::default().deduplicate(&mut batch, &[]);
        assert!(!batch[0].is_duplicate);
        assert!(batch[1].is_duplicate);
        assert_eq!(batch[1].original_id.as_deref(), Some(batch[0].id.as_str()));
    }

    #[test]
    fn test_stored_original_is_kept() {
        let stored = record("Seed Fund", "DPIIT", 60.0, "https://old.gov.in", 0.5);
        let mut stored_dup = record("Seed Fund", "DPIIT", 60.0, "https://mirror.com", 0.4);
        stored_dup.is_duplicate = true;
        stored_dup.original_id = Some(stored.id.clone());

        let mut batch = vec![record("Seed Fund Scheme", "DPIIT", 61.0, "https://new.gov.in", 1.0)];
        let outcome =
            Deduplicator::default().deduplicate(&mut batch, &[stored.clone(), stored_dup]);

        assert!(batch[0].is_duplicate);
        assert_eq!(batch[0].original_id.as_deref(), Some(stored.id.as_str()));
        assert_eq!(outcome.updated_existing.len(), 1);
        let updated = &outcome.updated_existing[0];
        assert_eq!(updated.id, stored.id);
        assert!(updated.source_urls.contains(&"https://new.gov.in".to_string()));
        assert!(updated.source_urls.contains(&"https://mirror.com".to_string()));
    }

    #[test]
    fn test_generic_word_titles_keep_their_identity() {
        let dedup = Deduplicator::default();
        let a = record("Startup Innovation Challenge", "DST", 50.0, "https://a.gov.in", 0.9);
        let b = record("Grant Support Programme", "DST", 50.0, "https://b.gov.in", 0.9);
        assert!(!dedup.is_same_grant(&a, &b));

        let c = record("Innovation Challenge", "DST", 50.0, "https://c.gov.in", 0.9);
        assert!(!dedup.is_same_grant(&a, &c));
        let d = record("Startup Innovation Challenge", "DST", 52.0, "https://d.gov.in", 0.9);
        assert!(dedup.is_same_grant(&a, &d));
    }

    #[test]
    fn test_missing_agency_never_matches() {
        let dedup = Deduplicator::default();
        let known = record("Seed Fund", "DPIIT", 60.0, "https://a.gov.in", 0.9);
        let mut unknown = record("Seed Fund", "", 60.0, "https://news.com/seed", 0.6);
        unknown.candidate.agency = None;
        assert!(!dedup.is_same_grant(&known, &unknown));
        assert!(!dedup.is_same_grant(&unknown, &unknown.clone()));

        let mut batch = vec![known, unknown];
        let outcome = dedup.deduplicate(&mut batch, &[]);
        assert_eq!(outcome.report.duplicates_found, 0);
    }

    #[test]
    fn test_batch_bridging_two_stored_originals_leaves_no_chain() {
        // 100~120 and 120~144 are within 20%, 100~144 is not, so only the
        // batch record links the two stored groups.
        let first = record("Seed Fund", "DPIIT", 100.0, "https://first.gov.in", 0.8);
        let second = record("Seed Fund", "DPIIT", 144.0, "https://second.gov.in", 0.6);
        let mut second_dup = record("Seed Fund", "DPIIT", 144.0, "https://mirror.com", 0.4);
        second_dup.is_duplicate = true;
        second_dup.original_id = Some(second.id.clone());
        let existing = vec![first.clone(), second.clone(), second_dup.clone()];

        let mut batch = vec![record("Seed Fund", "DPIIT", 120.0, "https://bridge.gov.in", 0.7)];
        let outcome = Deduplicator::default().deduplicate(&mut batch, &existing);

        assert!(batch[0].is_duplicate);
        assert_eq!(batch[0].original_id.as_deref(), Some(first.id.as_str()));

        fn updated<'a>(records: &'a [VettedRecord], id: &str) -> &'a VettedRecord {
            records.iter().find(|r| r.id == id).unwrap()
        }
        let kept = updated(&outcome.updated_existing, &first.id);
        assert!(!kept.is_duplicate);
        assert_eq!(kept.source_urls.len(), 4);

        let demoted = updated(&outcome.updated_existing, &second.id);
        assert!(demoted.is_duplicate);
        assert_eq!(demoted.original_id.as_deref(), Some(first.id.as_str()));

        let repointed = updated(&outcome.updated_existing, &second_dup.id);
        assert!(repointed.is_duplicate);
        assert_eq!(repointed.original_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(outcome.updated_existing.len(), 3);
    }

    #[test]
    fn test_unrelated_records_untouched() {
        let mut batch = vec![
            record("Seed Fund", "DPIIT", 60.0, "https://a.gov.in", 0.9),
            record("Biotechnology Ignition", "BIRAC", 50.0, "https://birac.nic.in", 0.9),
        ];
        let outcome = Deduplicator::default().deduplicate(&mut batch, &[]);
        assert!(batch.iter().all(|r| !r.is_duplicate));
        assert_eq!(batch[0].source_urls, vec!["https://a.gov.in"]);
        assert_eq!(outcome.report.unique_records, 2);
    }
}
