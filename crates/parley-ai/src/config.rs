//! Process-wide settings.
//!
//! Loaded once at startup from `~/.config/parley/config.toml` (or the file
//! named by `PARLEY_CONFIG`), then overridden by `PARLEY_*` environment
//! variables. A missing file means defaults; anything malformed fails fast.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AiError, Result};
use crate::guardrails::GuardrailPolicy;

pub const CONFIG_ENV: &str = "PARLEY_CONFIG";
const ENV_PREFIX: &str = "PARLEY_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm_max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_backoff_factor: f64,
    pub max_tool_iterations: usize,
    pub guardrails_enabled: bool,
    pub default_allowed_themes: Vec<String>,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout_secs: u64,
    /// Turns of history shown to the semantic theme classifier.
    pub semantic_history_turns: usize,
    pub log_level: String,
    /// Default guardrail policy (`[guardrails]` table).
    pub guardrails: GuardrailPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_max_retries: 3,
            retry_initial_delay_ms: 1000,
            retry_backoff_factor: 2.0,
            max_tool_iterations: 5,
            guardrails_enabled: true,
            default_allowed_themes: Vec::new(),
            breaker_failure_threshold: 5,
            breaker_recovery_timeout_secs: 60,
            semantic_history_turns: 3,
            log_level: "info".to_string(),
            guardrails: GuardrailPolicy::default(),
        }
    }
}

impl Settings {
    /// Load from the default location and the process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(Self::default_path);
        Self::load_with(path.as_deref(), std::env::vars())
    }

    /// Load from an explicit file (if any) plus the given variables.
    pub fn load_with<I>(path: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        settings.apply_env(vars)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a TOML file; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| AiError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AiError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AiError::Config(e.to_string()))
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("parley").join("config.toml"))
    }

    /// Apply `PARLEY_*` overrides. Unknown keys are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field {
                "LLM_MAX_RETRIES" => self.llm_max_retries = parse_env(&key, &value)?,
                "RETRY_INITIAL_DELAY_MS" => self.retry_initial_delay_ms = parse_env(&key, &value)?,
                "RETRY_BACKOFF_FACTOR" => self.retry_backoff_factor = parse_env(&key, &value)?,
                "MAX_TOOL_ITERATIONS" => self.max_tool_iterations = parse_env(&key, &value)?,
                "GUARDRAILS_ENABLED" => self.guardrails_enabled = parse_env(&key, &value)?,
                "DEFAULT_ALLOWED_THEMES" => self.default_allowed_themes = split_list(&value),
                "BREAKER_FAILURE_THRESHOLD" => {
                    self.breaker_failure_threshold = parse_env(&key, &value)?
                }
                "BREAKER_RECOVERY_TIMEOUT_SECS" => {
                    self.breaker_recovery_timeout_secs = parse_env(&key, &value)?
                }
                "SEMANTIC_HISTORY_TURNS" => self.semantic_history_turns = parse_env(&key, &value)?,
                "LOG_LEVEL" => self.log_level = value,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.breaker_failure_threshold == 0 {
            return Err(AiError::Config(
                "breaker_failure_threshold must be at least 1".to_string(),
            ));
        }
        if !self.retry_backoff_factor.is_finite() || self.retry_backoff_factor < 1.0 {
            return Err(AiError::Config(
                "retry_backoff_factor must be a finite number >= 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.guardrails.min_confidence) {
            return Err(AiError::Config(
                "guardrails.min_confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AiError::Config(format!("invalid value for {key}: {value:?}")))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
