//! Completeness rubric and the local re-check that runs without the
//! extraction service.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::models::{Requirement, RequirementType};

/// Requirement type → ordered list of element names a complete
/// requirement of that type must state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct Rubric {
    criteria: BTreeMap<RequirementType, Vec<String>>,
}

impl Default for Rubric {
    fn default() -> Self {
        let mut criteria = BTreeMap::new();
        criteria.insert(
            RequirementType::Functional,
            to_owned(&["触发条件", "处理逻辑", "输出结果", "验收标准", "异常处理"]),
        );
        criteria.insert(
            RequirementType::NonFunctional,
            to_owned(&["量化指标", "测量场景", "达标条件"]),
        );
        criteria.insert(
            RequirementType::Interface,
            to_owned(&["接口名称", "输入参数", "输出格式", "调用频率"]),
        );
        Self { criteria }
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl From<BTreeMap<String, Vec<String>>> for Rubric {
    /// Keys may be any label accepted by [`RequirementType::from_label`].
    /// Two labels mapping to the same type have their element lists merged.
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut criteria: BTreeMap<RequirementType, Vec<String>> = BTreeMap::new();
        for (label, elements) in raw {
            let entry = criteria.entry(RequirementType::from_label(&label)).or_default();
            for element in elements {
                let element = element.trim().to_string();
                if !element.is_empty() && !entry.contains(&element) {
                    entry.push(element);
                }
            }
        }
        Self { criteria }
    }
}

impl From<Rubric> for BTreeMap<String, Vec<String>> {
    fn from(rubric: Rubric) -> Self {
        rubric
            .criteria
            .into_iter()
            .map(|(t, elements)| (t.label().to_string(), elements))
            .collect()
    }
}

impl Rubric {
    /// Load a rubric from a JSON object of `label → [element, ...]`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let rubric: Rubric = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Ok(rubric)
    }

    /// Expected elements for a type; empty when the rubric has no entry.
    pub fn expected(&self, req_type: RequirementType) -> &[String] {
        self.criteria
            .get(&req_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Label-keyed view for prompts and reports.
    pub fn labelled(&self) -> BTreeMap<&'static str, &[String]> {
        self.criteria
            .iter()
            .map(|(t, elements)| (t.label(), elements.as_slice()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.values().all(Vec::is_empty)
    }
}

/// Re-check one requirement against the rubric.
///
/// Missing elements are unioned into the service-reported set. The score can
/// only go up: the final score is the max of the service score and the local
/// `(1 - missing/expected) * 100`. Types with no expected elements keep
/// their score.
pub fn recheck_requirement(requirement: &mut Requirement, rubric: &Rubric) {
    let expected = rubric.expected(requirement.req_type);

    let missing_locally: Vec<&String> = expected
        .iter()
        .filter(|name| !requirement.elements.contains_key(name.as_str()))
        .collect();

    requirement
        .missing_elements
        .extend(missing_locally.iter().map(|s| s.to_string()));

    if !expected.is_empty() {
        let local_score =
            (1.0 - missing_locally.len() as f64 / expected.len() as f64) * 100.0;
        requirement.completeness_score = requirement.completeness_score.max(local_score);
    }
}

/// Re-check every requirement in place.
pub fn recheck_all(requirements: &mut [Requirement], rubric: &Rubric) {
    for requirement in requirements.iter_mut() {
        recheck_requirement(requirement, rubric);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn functional(elements: &[&str]) -> Requirement {
        Requirement::new("R1", "用户登录", RequirementType::Functional)
            .with_elements(elements.iter().map(|e| (*e, "x")))
    }

    #[test]
    fn default_rubric_matches_known_types() {
        let rubric = Rubric::default();
        assert_eq!(rubric.expected(RequirementType::Functional).len(), 5);
        assert_eq!(rubric.expected(RequirementType::NonFunctional).len(), 3);
        assert_eq!(rubric.expected(RequirementType::Interface).len(), 4);
        assert!(rubric.expected(RequirementType::Unknown).is_empty());
    }

    #[test]
    fn recheck_adds_missing_and_scores() {
        let rubric = Rubric::default();
        let mut req = functional(&["触发条件", "处理逻辑"]);
        recheck_requirement(&mut req, &rubric);

        assert_eq!(req.missing_elements.len(), 3);
        assert!(req.missing_elements.contains("验收标准"));
        assert!((req.completeness_score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn recheck_never_lowers_service_score() {
        let rubric = Rubric::default();
        let mut req = functional(&[]);
        req.completeness_score = 85.0;
        recheck_requirement(&mut req, &rubric);

        assert_eq!(req.completeness_score, 85.0);
        assert_eq!(req.missing_elements.len(), 5);
    }

    #[test]
    fn complete_requirement_gains_no_missing_elements() {
        let rubric = Rubric::default();
        let mut req = functional(&["触发条件", "处理逻辑", "输出结果", "验收标准", "异常处理"]);
        recheck_requirement(&mut req, &rubric);

        assert!(req.missing_elements.is_empty());
        assert_eq!(req.completeness_score, 100.0);
    }

    #[test]
    fn recheck_unions_with_service_reported_missing() {
        let rubric = Rubric::default();
        let mut req = functional(&["触发条件", "处理逻辑", "输出结果", "验收标准"]);
        req.missing_elements.insert("异常处理".into());
        req.missing_elements.insert("性能约束".into());
        recheck_requirement(&mut req, &rubric);

        assert_eq!(req.missing_elements.len(), 2);
        assert!(req.missing_elements.contains("性能约束"));
    }

    #[test]
    fn unknown_type_score_untouched() {
        let rubric = Rubric::default();
        let mut req = Requirement::new("R9", "杂项", RequirementType::Unknown);
        req.completeness_score = 12.5;
        recheck_requirement(&mut req, &rubric);

        assert_eq!(req.completeness_score, 12.5);
        assert!(req.missing_elements.is_empty());
    }

    #[test]
    fn rubric_json_accepts_any_label() {
        let json = r#"{"functional": ["触发条件"], "接口需求": ["接口名称", "接口名称"]}"#;
        let rubric: Rubric = serde_json::from_str(json).unwrap();
        assert_eq!(rubric.expected(RequirementType::Functional), ["触发条件".to_string()]);
        assert_eq!(rubric.expected(RequirementType::Interface).len(), 1);
        assert!(rubric.expected(RequirementType::NonFunctional).is_empty());
    }

    #[test]
    fn rubric_serializes_with_labels() {
        let json = serde_json::to_value(Rubric::default()).unwrap();
        assert!(json.get("功能需求").is_some());
        assert!(json.get("接口需求").is_some());
    }

    #[test]
    fn rubric_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rubric.json");
        std::fs::write(&path, r#"{"非功能需求": ["量化指标"]}"#).unwrap();

        let rubric = Rubric::from_json_file(&path).unwrap();
        assert_eq!(rubric.expected(RequirementType::NonFunctional).len(), 1);
    }

    #[test]
    fn rubric_file_with_bad_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rubric.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(Rubric::from_json_file(&path), Err(ConfigError::Parse(_))));
    }
}
