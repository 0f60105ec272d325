//! Human-readable Markdown reports.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::models::{BatchSummary, ValidationResult};

const MAX_LISTED_REQUIREMENTS: usize = 10;
const MAX_LISTED_SUGGESTIONS: usize = 10;
const DETAIL_TEXT_CHARS: usize = 200;
const LISTED_TEXT_CHARS: usize = 100;

fn excerpt(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Pipes and newlines would break a table row.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn joined_or_none<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let joined = items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "无".to_string()
    } else {
        joined
    }
}

/// Unique suggestions, longest first, at most ten.
pub fn top_suggestions(result: &ValidationResult) -> Vec<&str> {
    let unique: BTreeSet<&str> = result
        .requirements
        .iter()
        .flat_map(|r| r.improvement_suggestions.iter().map(String::as_str))
        .collect();
    let mut suggestions: Vec<&str> = unique.into_iter().collect();
    suggestions.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    suggestions.truncate(MAX_LISTED_SUGGESTIONS);
    suggestions
}

pub fn render_document_markdown(result: &ValidationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# 需求完整性验证报告\n");

    let _ = writeln!(out, "## 一、文档基本信息\n");
    let _ = writeln!(out, "| 项目 | 内容 |\n| --- | --- |");
    let _ = writeln!(out, "| 文档名称 | {} |", cell(&result.document_name));
    let _ = writeln!(out, "| 文档ID | {} |", result.document_id);
    let _ = writeln!(out, "| 验证耗时 | {:.2} 秒 |", result.validation_time_secs);
    let _ = writeln!(out, "| 片段数 | {} (失败 {}) |", result.segment_count, result.failed_segments);
    let _ = writeln!(out, "| 生成时间 | {} |\n", result.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    let _ = writeln!(out, "## 二、完整性验证摘要\n");
    let _ = writeln!(out, "| 总需求数 | 完整需求数 | 完整性得分 |\n| --- | --- | --- |");
    let _ = writeln!(
        out,
        "| {} | {} | {:.2}% |\n",
        result.total_requirements, result.complete_requirements, result.completeness_score
    );

    let _ = writeln!(out, "## 三、缺失要素分析\n");
    if result.missing_elements_by_type.is_empty() {
        let _ = writeln!(out, "未发现缺失要素，需求完整性良好。\n");
    } else {
        let _ = writeln!(out, "| 需求类型 | 缺失要素 | 数量 |\n| --- | --- | --- |");
        for (req_type, elements) in &result.missing_elements_by_type {
            for (element, count) in elements {
                let _ = writeln!(out, "| {} | {} | {} |", req_type.label(), cell(element), count);
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## 四、详细缺失清单\n");
    let incomplete: Vec<_> = result
        .incomplete_requirements()
        .take(MAX_LISTED_REQUIREMENTS)
        .collect();
    if incomplete.is_empty() {
        let _ = writeln!(out, "无缺失要素需求。\n");
    } else {
        for (i, req) in incomplete.iter().enumerate() {
            let _ = writeln!(out, "{}. 需求ID: {}", i + 1, req.id);
            let _ = writeln!(out, "   - 描述: {}", excerpt(&req.text, LISTED_TEXT_CHARS).replace('\n', " "));
            let _ = writeln!(out, "   - 缺失要素: {}", joined_or_none(&req.missing_elements));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## 五、整改建议\n");
    let suggestions = top_suggestions(result);
    if suggestions.is_empty() {
        let _ = writeln!(out, "暂无具体整改建议。\n");
    } else {
        for (i, suggestion) in suggestions.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, suggestion);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## 附录：需求明细\n");
    let _ = writeln!(
        out,
        "| 需求ID | 需求类型 | 需求描述 | 完整性得分 | 缺失要素 | 整改建议 | 所在片段 |\n| --- | --- | --- | --- | --- | --- | --- |"
    );
    for req in &result.requirements {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {:.1} | {} | {} | {} |",
            cell(&req.id),
            req.req_type.label(),
            cell(&excerpt(&req.text, DETAIL_TEXT_CHARS)),
            req.completeness_score,
            cell(&joined_or_none(&req.missing_elements)),
            cell(&joined_or_none(&req.improvement_suggestions)),
            cell(&req.segment_id),
        );
    }
    out
}

pub fn render_batch_markdown(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# 批量验证汇总\n");
    let _ = writeln!(
        out,
        "验证文档 {} 个，失败 {} 个。生成时间 {}。\n",
        summary.documents_validated,
        summary.documents_failed,
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "| 指标 | 最小 | 平均 | 最大 |\n| --- | --- | --- | --- |");
    let _ = writeln!(
        out,
        "| 完整性得分 | {:.2} | {:.2} | {:.2} |",
        summary.score.min, summary.score.mean, summary.score.max
    );
    let _ = writeln!(
        out,
        "| 需求数 | {:.0} | {:.2} | {:.0} |\n",
        summary.requirement_count.min, summary.requirement_count.mean, summary.requirement_count.max
    );

    if !summary.rows.is_empty() {
        let _ = writeln!(
            out,
            "| 文档名称 | 总需求数 | 完整需求数 | 完整性得分 | 验证耗时(秒) |\n| --- | --- | --- | --- | --- |"
        );
        for row in &summary.rows {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.2}% | {:.2} |",
                cell(&row.document_name),
                row.total_requirements,
                row.complete_requirements,
                row.completeness_score,
                row.validation_time_secs
            );
        }
        let _ = writeln!(out);
    }

    if !summary.failures.is_empty() {
        let _ = writeln!(out, "## 验证失败的文档\n");
        for failure in &summary.failures {
            let _ = writeln!(out, "- {}: {}", failure.document_name, failure.reason);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{DocumentFailure, Requirement, RequirementType};
    use crate::pipeline::validation::{aggregate, summarize_batch, SegmentCounts};

    fn requirement(id: &str, missing: &[&str], suggestions: &[&str]) -> Requirement {
        let mut r = Requirement::new(id, format!("需求 {id}"), RequirementType::Functional);
        r.missing_elements = missing.iter().map(|s| s.to_string()).collect();
        r.improvement_suggestions = suggestions.iter().map(|s| s.to_string()).collect();
        r
    }

    fn result_with(requirements: Vec<Requirement>) -> ValidationResult {
        aggregate("srs.txt", requirements, Duration::from_secs(1), SegmentCounts { total: 1, failed: 0 })
    }

    #[test]
    fn suggestions_unique_longest_first() {
        let result = result_with(vec![
            requirement("a", &[], &["短", "一条很长的建议"]),
            requirement("b", &[], &["短", "中等建议"]),
        ]);
        assert_eq!(top_suggestions(&result), vec!["一条很长的建议", "中等建议", "短"]);
    }

    #[test]
    fn suggestions_capped_at_ten() {
        let many: Vec<String> = (0..15).map(|i| format!("建议{i:02}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let result = result_with(vec![requirement("a", &[], &refs)]);
        assert_eq!(top_suggestions(&result).len(), 10);
    }

    #[test]
    fn incomplete_list_capped_at_ten() {
        let reqs = (0..12).map(|i| requirement(&format!("R{i}"), &["验收标准"], &[])).collect();
        let markdown = render_document_markdown(&result_with(reqs));
        assert!(markdown.contains("10. 需求ID: R9"));
        assert!(!markdown.contains("11. 需求ID"));
        assert!(markdown.contains("| 功能需求 | 验收标准 | 12 |"));
    }

    #[test]
    fn complete_document_has_placeholders() {
        let markdown = render_document_markdown(&result_with(vec![requirement("a", &[], &[])]));
        assert!(markdown.contains("未发现缺失要素，需求完整性良好。"));
        assert!(markdown.contains("无缺失要素需求。"));
        assert!(markdown.contains("暂无具体整改建议。"));
    }

    #[test]
    fn table_cells_escape_pipes() {
        assert_eq!(cell("a|b\nc"), "a\\|b c");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
    }

    #[test]
    fn batch_markdown_lists_rows_and_failures() {
        let summary = summarize_batch(
            &[result_with(vec![requirement("a", &[], &[])])],
            &[DocumentFailure {
                document_name: "c.xyz".into(),
                reason: "Unsupported file format: .xyz".into(),
            }],
        );
        let markdown = render_batch_markdown(&summary);
        assert!(markdown.contains("| srs.txt | 1 | 1 |"));
        assert!(markdown.contains("- c.xyz: Unsupported file format: .xyz"));
    }
}
