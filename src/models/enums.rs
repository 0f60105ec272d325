use serde::{Deserialize, Serialize};

/// Category of an extracted requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    Functional,
    NonFunctional,
    Interface,
    Unknown,
}

/// Keywords checked before the functional ones: "非功能需求" contains "功能"
/// and "non-functional" contains "functional".
const NON_FUNCTIONAL_KEYWORDS: &[&str] = &[
    "非功能",
    "性能",
    "安全",
    "non-functional",
    "non_functional",
    "nonfunctional",
    "non functional",
    "performance",
    "security",
];

const FUNCTIONAL_KEYWORDS: &[&str] = &["功能", "functional"];

const INTERFACE_KEYWORDS: &[&str] = &["接口", "interface"];

impl RequirementType {
    pub const ALL: [RequirementType; 4] = [
        Self::Functional,
        Self::NonFunctional,
        Self::Interface,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Functional => "functional",
            Self::NonFunctional => "non_functional",
            Self::Interface => "interface",
            Self::Unknown => "unknown",
        }
    }

    /// Label used in prompts, rubric files and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Functional => "功能需求",
            Self::NonFunctional => "非功能需求",
            Self::Interface => "接口需求",
            Self::Unknown => "未知类型",
        }
    }

    /// Map a free-text label returned by the extraction service.
    /// Case-insensitive substring match; anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        if NON_FUNCTIONAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::NonFunctional
        } else if FUNCTIONAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Functional
        } else if INTERFACE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Interface
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for RequirementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_chinese_labels() {
        assert_eq!(RequirementType::from_label("功能需求"), RequirementType::Functional);
        assert_eq!(RequirementType::from_label("非功能需求"), RequirementType::NonFunctional);
        assert_eq!(RequirementType::from_label("性能要求"), RequirementType::NonFunctional);
        assert_eq!(RequirementType::from_label("安全需求"), RequirementType::NonFunctional);
        assert_eq!(RequirementType::from_label("接口需求"), RequirementType::Interface);
    }

    #[test]
    fn maps_english_labels_case_insensitively() {
        assert_eq!(RequirementType::from_label("Functional"), RequirementType::Functional);
        assert_eq!(RequirementType::from_label("NON-FUNCTIONAL"), RequirementType::NonFunctional);
        assert_eq!(RequirementType::from_label("External Interface"), RequirementType::Interface);
    }

    #[test]
    fn unrecognised_label_is_unknown() {
        assert_eq!(RequirementType::from_label(""), RequirementType::Unknown);
        assert_eq!(RequirementType::from_label("业务规则"), RequirementType::Unknown);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&RequirementType::NonFunctional).unwrap();
        assert_eq!(json, "\"non_functional\"");
        for t in RequirementType::ALL {
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t.as_str()));
        }
    }
}
