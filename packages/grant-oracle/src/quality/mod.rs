//! Record quality pipeline.
//!
//! Candidates become vetted records through five stages, in this order:
//!
//! 1. confidence scoring (dedup tie-breaks depend on it)
//! 2. deduplication against the batch and stored records
//! 3. eligibility matching, when a profile is given
//! 4. status monitoring
//! 5. complexity estimation
//!
//! Stages 3-5 only touch the records that survived deduplication.

pub mod complexity;
pub mod confidence;
pub mod dedup;
pub mod eligibility;
pub mod similarity;
pub mod status;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use complexity::ComplexityEstimator;
pub use confidence::{classify_source, ConfidenceScorer};
pub use dedup::{DedupConfig, DedupOutcome, DedupReport, Deduplicator, DuplicatePair};
pub use eligibility::{CriterionWeights, EligibilityMatcher};
pub use status::{StatusChange, StatusMonitor, StatusReport};

use crate::traits::SourceProber;
use crate::types::{CandidateRecord, RequesterProfile, VettedRecord};

/// Input to one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRequest {
    pub candidates: Vec<CandidateRecord>,
    /// Previously vetted records to deduplicate against
    pub existing_records: Vec<VettedRecord>,
    pub profile: Option<RequesterProfile>,
}

impl QualityRequest {
    pub fn new(candidates: Vec<CandidateRecord>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    pub fn with_existing(mut self, existing: Vec<VettedRecord>) -> Self {
        self.existing_records = existing;
        self
    }

    pub fn with_profile(mut self, profile: Option<RequesterProfile>) -> Self {
        self.profile = profile;
        self
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityOutput {
    /// One record per distinct candidate, in input order
    pub records: Vec<VettedRecord>,
    /// Stored records whose duplicate links or sources changed
    pub updated_existing: Vec<VettedRecord>,
    /// Candidates folded into an earlier candidate with the same id
    pub exact_repeats: usize,
    pub dedup_report: DedupReport,
    pub status_report: StatusReport,
}

impl QualityOutput {
    /// Records that are not duplicates.
    pub fn originals(&self) -> impl Iterator<Item = &VettedRecord> {
        self.records.iter().filter(|r| !r.is_duplicate)
    }
}

/// Runs the quality stages over a batch.
pub struct QualityPipeline {
    confidence: ConfidenceScorer,
    dedup: Deduplicator,
    eligibility: EligibilityMatcher,
    status: StatusMonitor,
    complexity: ComplexityEstimator,
    prober: Arc<dyn SourceProber>,
}

impl QualityPipeline {
    pub fn new(prober: Arc<dyn SourceProber>) -> Self {
        Self {
            confidence: ConfidenceScorer::new(),
            dedup: Deduplicator::default(),
            eligibility: EligibilityMatcher::default(),
            status: StatusMonitor::default(),
            complexity: ComplexityEstimator::new(),
            prober,
        }
    }

    pub fn with_dedup_config(mut self, config: DedupConfig) -> Self {
        self.dedup = Deduplicator::new(config);
        self
    }

    pub fn with_weights(mut self, weights: CriterionWeights) -> Self {
        self.eligibility = EligibilityMatcher::new(weights);
        self
    }

    pub fn with_status_monitor(mut self, monitor: StatusMonitor) -> Self {
        self.status = monitor;
        self
    }

    pub fn status_monitor(&self) -> &StatusMonitor {
        &self.status
    }

    pub fn prober(&self) -> &dyn SourceProber {
        self.prober.as_ref()
    }

    /// Vet a batch of candidates.
    pub async fn run(&self, request: QualityRequest, now: DateTime<Utc>) -> QualityOutput {
        let QualityRequest {
            candidates,
            existing_records,
            profile,
        } = request;
        let received = candidates.len();

        let mut records = collapse_repeats(candidates);
        let exact_repeats = received - records.len();
        for record in &mut records {
            self.confidence.apply(record);
        }

        let DedupOutcome {
            report: dedup_report,
            updated_existing,
        } = self.dedup.deduplicate(&mut records, &existing_records);

        if let Some(profile) = &profile {
            for record in records.iter_mut().filter(|r| !r.is_duplicate) {
                record.eligibility_match = Some(self.eligibility.match_record(record, profile));
            }
        }

        let status_report = self
            .status
            .check(
                records.iter_mut().filter(|r| !r.is_duplicate),
                self.prober.as_ref(),
                now,
            )
            .await;

        for record in records.iter_mut().filter(|r| !r.is_duplicate) {
            record.complexity = Some(self.complexity.assess(record));
        }

        info!(
            candidates = received,
            records = records.len(),
            exact_repeats,
            duplicates = dedup_report.duplicates_found,
            updated_existing = updated_existing.len(),
            status_changes = status_report.changes.len(),
            "Quality pipeline finished"
        );

        QualityOutput {
            records,
            updated_existing,
            exact_repeats,
            dedup_report,
            status_report,
        }
    }
}

/// Fold candidates that hash to the same id into the first occurrence.
fn collapse_repeats(candidates: Vec<CandidateRecord>) -> Vec<VettedRecord> {
    let mut records: Vec<VettedRecord> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let record = VettedRecord::from_candidate(candidate);
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(first) => {
                debug!(record_id = %record.id, "Folding repeated candidate");
                for url in record.source_urls {
                    if !first.source_urls.contains(&url) {
                        first.source_urls.push(url);
                    }
                }
            }
            None => records.push(record),
        }
    }
    records
}
