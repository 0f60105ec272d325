use serde_json::json;

use crate::models::Requirement;
use crate::pipeline::validation::Rubric;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
你是一位资深需求工程师。你的唯一任务是从需求文档片段中识别需求条目，
并按类别归类。只提取文档中明确写出的内容，不要补充或推测。
输出必须是合法的 JSON，不要附加任何解释文字。
"#;

pub const EVALUATION_SYSTEM_PROMPT: &str = r#"
你是一位需求质量评审专家。你的唯一任务是根据给定的完整性评估标准，
评估每一条需求的完整性，指出缺失的要素并给出具体的改进建议。
输出必须是合法的 JSON，不要附加任何解释文字。
"#;

/// Build the extraction prompt for one segment. Text beyond `text_limit`
/// characters is not sent.
pub fn build_extraction_prompt(text: &str, text_limit: usize) -> String {
    let excerpt = truncate_chars(text, text_limit);
    format!(
        r#"请解析以下需求文档片段，提取所有需求条目并按类别分类：
- 功能需求
- 非功能需求
- 接口需求

输出JSON格式：
{{
  "requirements": [
    {{
      "id": "自动生成的唯一ID",
      "text": "需求描述文本",
      "type": "功能需求|非功能需求|接口需求",
      "elements": {{"要素名称": "文档中的对应内容"}}
    }}
  ]
}}

<document>
{excerpt}
</document>

请开始解析："#
    )
}

/// Build the evaluation prompt: the active rubric plus every candidate
/// extracted from the segment.
pub fn build_evaluation_prompt(rubric: &Rubric, candidates: &[Requirement]) -> String {
    let criteria = serde_json::to_string_pretty(&rubric.labelled()).unwrap_or_default();
    let input: Vec<_> = candidates
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "text": r.text,
                "type": r.req_type.label(),
                "elements": r.elements,
            })
        })
        .collect();
    let input = serde_json::to_string_pretty(&json!({ "requirements": input })).unwrap_or_default();

    format!(
        r#"评估需求条目的完整性。

完整性评估标准：
{criteria}

输入数据：
{input}

输出JSON格式：
{{
  "requirements": [
    {{
      "id": "需求ID",
      "completeness_score": 85.5,
      "missing_elements": ["验收标准", "异常处理"],
      "improvement_suggestions": ["具体建议"]
    }}
  ]
}}
请开始评估："#
    )
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
