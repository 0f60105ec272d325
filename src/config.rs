//! Application constants and the validator configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::validation::rubric::Rubric;

/// Application-level constants
pub const APP_NAME: &str = "reqcheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const ENV_API_KEY: &str = "REQCHECK_API_KEY";
const ENV_DEEPSEEK_API_KEY: &str = "DEEPSEEK_API_KEY";
const ENV_API_URL: &str = "REQCHECK_API_URL";
const ENV_MODEL: &str = "REQCHECK_MODEL";
const ENV_CACHE_DIR: &str = "REQCHECK_CACHE_DIR";
const ENV_OUTPUT_DIR: &str = "REQCHECK_OUTPUT_DIR";
const ENV_BATCH_SIZE: &str = "REQCHECK_BATCH_SIZE";
const ENV_MAX_SEGMENT_LENGTH: &str = "REQCHECK_MAX_SEGMENT_LENGTH";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "reqcheck=info,reqcheck_lib=info"
}

/// Platform cache directory for segment results, `./cache` if unknown.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("cache"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Connection settings for the extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_url: String,
    /// Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Per-call timeout.
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Backoff before retry `n` is `retry_base_delay_ms * 2^n`.
    pub retry_base_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.deepseek.com/v1/chat/completions".into(),
            api_key: None,
            model: "deepseek-chat".into(),
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: 2048,
            timeout_secs: 60,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub service: ServiceConfig,
    /// Target segment size in characters.
    pub max_segment_length: usize,
    /// Segments processed in parallel per document.
    pub batch_size: usize,
    /// Segment text beyond this many characters is not sent in the prompt.
    pub prompt_text_limit: usize,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
    pub rubric: Rubric,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            max_segment_length: 30_000,
            batch_size: 5,
            prompt_text_limit: 5_000,
            input_dir: PathBuf::from("input_docs"),
            output_dir: PathBuf::from("output_reports"),
            cache_dir: default_cache_dir(),
            cache_enabled: true,
            rubric: Rubric::default(),
        }
    }
}

impl ValidatorConfig {
    /// Defaults, then the optional JSON file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).or_else(|| lookup(ENV_DEEPSEEK_API_KEY)) {
            if !key.trim().is_empty() {
                self.service.api_key = Some(key.trim().to_string());
            }
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.service.api_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.service.model = model;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = parse_usize("batch_size", &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_SEGMENT_LENGTH) {
            self.max_segment_length = parse_usize("max_segment_length", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_segment_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_segment_length",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn parse_usize(field: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("expected a positive integer, got {value:?}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::RequirementType;

    #[test]
    fn defaults_match_documented_values() {
        let config = ValidatorConfig::default();
        assert_eq!(config.max_segment_length, 30_000);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.service.max_retries, 3);
        assert_eq!(config.service.timeout_secs, 60);
        assert_eq!(config.service.model, "deepseek-chat");
        assert!(config.service.api_key.is_none());
        assert_eq!(config.rubric, Rubric::default());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("DEEPSEEK_API_KEY", " sk-test "),
            ("REQCHECK_BATCH_SIZE", "2"),
            ("REQCHECK_MODEL", "local-model"),
            ("REQCHECK_CACHE_DIR", "/tmp/rc-cache"),
        ]
        .into_iter()
        .collect();

        let mut config = ValidatorConfig::default();
        config
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.service.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.service.model, "local-model");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/rc-cache"));
    }

    #[test]
    fn reqcheck_key_wins_over_deepseek_key() {
        let mut config = ValidatorConfig::default();
        config
            .apply_env(|k| match k {
                "REQCHECK_API_KEY" => Some("primary".into()),
                "DEEPSEEK_API_KEY" => Some("fallback".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.service.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn bad_numeric_env_is_rejected() {
        let mut config = ValidatorConfig::default();
        let result = config.apply_env(|k| (k == "REQCHECK_BATCH_SIZE").then(|| "many".into()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "batch_size", .. })
        ));
    }

    #[test]
    fn zero_workers_fails_validation() {
        let config = ValidatorConfig {
            batch_size: 0,
            ..ValidatorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqcheck.json");
        std::fs::write(
            &path,
            r#"{"batch_size": 3, "service": {"model": "m"}, "rubric": {"接口需求": ["接口名称"]}}"#,
        )
        .unwrap();

        let config = ValidatorConfig::from_json_file(&path).unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.service.model, "m");
        assert_eq!(config.service.max_tokens, 2048);
        assert_eq!(config.rubric.expected(RequirementType::Interface).len(), 1);
        assert!(config.rubric.expected(RequirementType::Functional).is_empty());
    }

    #[test]
    fn serialized_config_omits_api_key() {
        let mut config = ValidatorConfig::default();
        config.service.api_key = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
