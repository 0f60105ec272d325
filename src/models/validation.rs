use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RequirementType;
use super::requirement::Requirement;

/// Outcome of validating one document. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Name + wall-clock derived; differs between runs on the same file.
    pub document_id: String,
    pub document_name: String,
    pub total_requirements: usize,
    pub complete_requirements: usize,
    pub completeness_score: f64,
    pub missing_elements_by_type: BTreeMap<RequirementType, BTreeMap<String, usize>>,
    pub requirements: Vec<Requirement>,
    pub segment_count: usize,
    pub failed_segments: usize,
    pub validation_time_secs: f64,
    pub generated_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn incomplete_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|r| !r.is_complete())
    }
}

/// A document that could not be validated inside a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_name: String,
    pub reason: String,
}

/// Min / mean / max over the documents of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// One row of the batch summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRow {
    pub document_name: String,
    pub total_requirements: usize,
    pub complete_requirements: usize,
    pub completeness_score: f64,
    pub validation_time_secs: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub documents_validated: usize,
    pub documents_failed: usize,
    pub score: Spread,
    pub requirement_count: Spread,
    pub rows: Vec<BatchRow>,
    pub failures: Vec<DocumentFailure>,
    pub generated_at: DateTime<Utc>,
}
