//! Per-document and per-batch completeness metrics.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{
    BatchRow, BatchSummary, DocumentFailure, Requirement, RequirementType, Spread,
    ValidationResult,
};
use crate::pipeline::import::short_hash;

/// Segment bookkeeping carried into the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentCounts {
    pub total: usize,
    pub failed: usize,
}

/// Identifier for one validation run of a document. Not content-stable.
pub fn document_id(document_name: &str, at: DateTime<Utc>) -> String {
    short_hash(
        &format!("{document_name}_{}", at.timestamp_nanos_opt().unwrap_or_default()),
        12,
    )
}

/// Arithmetic mean of the scores, 0 for no requirements.
pub fn mean_score(requirements: &[Requirement]) -> f64 {
    if requirements.is_empty() {
        return 0.0;
    }
    requirements.iter().map(|r| r.completeness_score).sum::<f64>() / requirements.len() as f64
}

/// Count of (type, element) occurrences across requirements with missing
/// elements.
pub fn missing_by_type(
    requirements: &[Requirement],
) -> BTreeMap<RequirementType, BTreeMap<String, usize>> {
    let mut counts: BTreeMap<RequirementType, BTreeMap<String, usize>> = BTreeMap::new();
    for requirement in requirements {
        if requirement.missing_elements.is_empty() {
            continue;
        }
        let by_element = counts.entry(requirement.req_type).or_default();
        for element in &requirement.missing_elements {
            *by_element.entry(element.clone()).or_default() += 1;
        }
    }
    counts
}

/// Build the result for one document from its re-checked requirements.
pub fn aggregate(
    document_name: &str,
    requirements: Vec<Requirement>,
    elapsed: Duration,
    segments: SegmentCounts,
) -> ValidationResult {
    let generated_at = Utc::now();
    ValidationResult {
        document_id: document_id(document_name, generated_at),
        document_name: document_name.to_string(),
        total_requirements: requirements.len(),
        complete_requirements: requirements.iter().filter(|r| r.is_complete()).count(),
        completeness_score: mean_score(&requirements),
        missing_elements_by_type: missing_by_type(&requirements),
        requirements,
        segment_count: segments.total,
        failed_segments: segments.failed,
        validation_time_secs: elapsed.as_secs_f64(),
        generated_at,
    }
}

fn spread(values: impl Iterator<Item = f64>) -> Spread {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return Spread::default();
    }
    Spread {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        mean: values.iter().sum::<f64>() / values.len() as f64,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Cross-document summary: min/mean/max of score and requirement count.
pub fn summarize_batch(results: &[ValidationResult], failures: &[DocumentFailure]) -> BatchSummary {
    BatchSummary {
        documents_validated: results.len(),
        documents_failed: failures.len(),
        score: spread(results.iter().map(|r| r.completeness_score)),
        requirement_count: spread(results.iter().map(|r| r.total_requirements as f64)),
        rows: results
            .iter()
            .map(|r| BatchRow {
                document_name: r.document_name.clone(),
                total_requirements: r.total_requirements,
                complete_requirements: r.complete_requirements,
                completeness_score: r.completeness_score,
                validation_time_secs: r.validation_time_secs,
                generated_at: r.generated_at,
            })
            .collect(),
        failures: failures.to_vec(),
        generated_at: Utc::now(),
    }
}
