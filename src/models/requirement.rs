use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::enums::RequirementType;

/// One requirement item extracted from a document segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub req_type: RequirementType,
    /// Segment the requirement was extracted from. Stamped by the validator.
    #[serde(default)]
    pub segment_id: String,
    /// Character span in the source document. No stage computes it yet,
    /// so it stays `(0, 0)`.
    #[serde(default)]
    pub position: (usize, usize),
    /// Element name → extracted value, e.g. `"触发条件" → "..."`.
    #[serde(default)]
    pub elements: BTreeMap<String, String>,
    /// 0–100.
    #[serde(default)]
    pub completeness_score: f64,
    #[serde(default)]
    pub missing_elements: BTreeSet<String>,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
}

impl Requirement {
    pub fn new(id: impl Into<String>, text: impl Into<String>, req_type: RequirementType) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            req_type,
            segment_id: String::new(),
            position: (0, 0),
            elements: BTreeMap::new(),
            completeness_score: 0.0,
            missing_elements: BTreeSet::new(),
            improvement_suggestions: Vec::new(),
        }
    }

    pub fn with_elements<I, K, V>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.elements = elements
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn is_complete(&self) -> bool {
        self.missing_elements.is_empty()
    }
}

/// A contiguous slice of a document's cleaned text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSegment {
    /// `{filename}_ch{n}` or `{base}_part{n}`.
    pub id: String,
    pub text: String,
    pub original_file: String,
}

impl DocumentSegment {
    pub fn new(id: impl Into<String>, text: impl Into<String>, original_file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            original_file: original_file.into(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requirement_has_empty_defaults() {
        let req = Requirement::new("R1", "系统应支持用户登录", RequirementType::Functional);
        assert_eq!(req.position, (0, 0));
        assert!(req.elements.is_empty());
        assert!(req.is_complete());
        assert_eq!(req.completeness_score, 0.0);
    }

    #[test]
    fn deserializes_sparse_cached_record() {
        let json = r#"{"id":"R1","text":"t","type":"interface"}"#;
        let req: Requirement = serde_json::from_str(json).unwrap();
        assert_eq!(req.req_type, RequirementType::Interface);
        assert!(req.missing_elements.is_empty());
        assert!(req.segment_id.is_empty());
    }

    #[test]
    fn segment_length_counts_chars_not_bytes() {
        let seg = DocumentSegment::new("a_ch1", "需求", "a.txt");
        assert_eq!(seg.char_len(), 2);
    }
}
