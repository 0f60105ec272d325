pub mod json;
pub mod markdown;

pub use json::*;
pub use markdown::*;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::models::{BatchSummary, ValidationResult};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-. ]").expect("valid file name regex"));

/// Replace characters outside `[\w\-. ]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_FILE_CHARS.replace_all(name, "_").into_owned()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Files written for one document or one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Write `<name>_report_<timestamp>.{json,md}` into `output_dir`.
pub fn write_document_reports(
    result: &ValidationResult,
    output_dir: &Path,
) -> Result<ReportPaths, ReportError> {
    std::fs::create_dir_all(output_dir)?;
    let stem = format!(
        "{}_report_{}",
        sanitize_file_name(&result.document_name),
        timestamp(result.generated_at)
    );
    let paths = ReportPaths {
        json: output_dir.join(format!("{stem}.json")),
        markdown: output_dir.join(format!("{stem}.md")),
    };

    write_json(&paths.json, result)?;
    std::fs::write(&paths.markdown, render_document_markdown(result))?;
    tracing::info!(
        document = %result.document_name,
        json = %paths.json.display(),
        markdown = %paths.markdown.display(),
        "Reports written"
    );
    Ok(paths)
}

/// Write `batch_summary_<timestamp>.{json,md}` into `output_dir`.
pub fn write_batch_reports(
    summary: &BatchSummary,
    output_dir: &Path,
) -> Result<ReportPaths, ReportError> {
    std::fs::create_dir_all(output_dir)?;
    let stem = format!("batch_summary_{}", timestamp(summary.generated_at));
    let paths = ReportPaths {
        json: output_dir.join(format!("{stem}.json")),
        markdown: output_dir.join(format!("{stem}.md")),
    };

    write_json(&paths.json, summary)?;
    std::fs::write(&paths.markdown, render_batch_markdown(summary))?;
    tracing::info!(json = %paths.json.display(), "Batch summary written");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{Requirement, RequirementType};
    use crate::pipeline::validation::{aggregate, summarize_batch, SegmentCounts};

    fn sample_result(name: &str) -> ValidationResult {
        let mut req = Requirement::new("FR-1", "系统应支持导出报表", RequirementType::Functional);
        req.completeness_score = 40.0;
        req.missing_elements.insert("验收标准".into());
        aggregate(name, vec![req], Duration::from_secs(2), SegmentCounts { total: 1, failed: 0 })
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_file_name("a/b\\c:d.txt"), "a_b_c_d.txt");
        assert_eq!(sanitize_file_name("需求 规格-v1.docx"), "需求 规格-v1.docx");
    }

    #[test]
    fn document_reports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result("需求/规格.txt");
        let paths = write_document_reports(&result, &dir.path().join("out")).unwrap();

        let name = paths.json.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("需求_规格.txt_report_"));
        assert!(name.ends_with(".json"));

        let parsed: ValidationResult =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(parsed.total_requirements, 1);
        assert_eq!(parsed.requirements[0].id, "FR-1");

        let markdown = std::fs::read_to_string(&paths.markdown).unwrap();
        assert!(markdown.contains("需求完整性验证报告"));
    }

    #[test]
    fn batch_reports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let summary = summarize_batch(&[sample_result("a.txt"), sample_result("b.txt")], &[]);
        let paths = write_batch_reports(&summary, dir.path()).unwrap();

        let name = paths.json.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("batch_summary_"));
        let parsed: BatchSummary =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(parsed.documents_validated, 2);
        assert!(std::fs::read_to_string(&paths.markdown).unwrap().contains("a.txt"));
    }
}
