//! Configuration for the evaluation pipeline.
//!
//! Settings come from an optional YAML file and are then overridden by
//! `STREAMEVAL_*` environment variables. Model-access settings (endpoint, key,
//! model id) have no usable defaults for endpoint and key; their absence is
//! reported when the agent registry is built.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Tolerance used when comparing the reported total against the metric mean.
pub const DEFAULT_TOTAL_TOLERANCE: f64 = 0.01;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Model endpoint, credentials and sampling settings.
    pub model: ModelAccessConfig,
    /// Retry policy for transient transport failures.
    pub retry: RetryConfig,
    /// Protocol settings.
    pub evaluation: EvaluationSettings,
}

/// Model-access settings shared by every role handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelAccessConfig {
    /// Base URL of the OpenAI-compatible API.
    pub api_base: Option<String>,
    /// API key used as a bearer token.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f64,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
    /// Timeout for a single model call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ModelAccessConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            request_timeout_secs: 120,
        }
    }
}

impl ModelAccessConfig {
    /// Create model-access settings with explicit endpoint, key and model.
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: Some(api_base.into()),
            api_key: Some(api_key.into()),
            model: model.into(),
            ..Self::default()
        }
    }

    /// The per-call timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks that endpoint, key and model id are all present.
    pub fn require_complete(&self) -> Result<(), ConfigError> {
        if is_blank(self.api_base.as_deref()) {
            return Err(ConfigError::MissingSetting("model.api_base".to_string()));
        }
        if is_blank(self.api_key.as_deref()) {
            return Err(ConfigError::MissingSetting("model.api_key".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingSetting("model.model".to_string()));
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Capped exponential backoff for transient transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry.
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.initial_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// How specialist roles take part in an evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationMode {
    /// One exchange with the coordinator, which covers all four dimensions.
    #[default]
    Coordinator,
    /// One concurrent sub-request per specialist, combined by the session.
    FanOut,
}

impl std::str::FromStr for DelegationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coordinator" => Ok(Self::Coordinator),
            "fan_out" | "fan-out" | "fanout" => Ok(Self::FanOut),
            other => Err(format!("unknown delegation mode '{}'", other)),
        }
    }
}

/// What to do with the total score reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalScorePolicy {
    /// Replace the total with the mean of the four metric scores.
    #[default]
    Recompute,
    /// Keep the total as produced; deviations are only logged.
    Trust,
}

impl std::str::FromStr for TotalScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recompute" => Ok(Self::Recompute),
            "trust" => Ok(Self::Trust),
            other => Err(format!("unknown total score policy '{}'", other)),
        }
    }
}

/// Protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Requested reply turns. The session caps the exchange at one.
    pub max_turns: u32,
    /// Coordinator-only or fan-out delegation.
    pub delegation: DelegationMode,
    /// Handling of the reported total score.
    pub total_policy: TotalScorePolicy,
    /// Allowed gap between the reported total and the metric mean.
    pub total_tolerance: f64,
    /// Re-asks with a stricter reminder after an unparseable reply.
    pub reminder_retries: u32,
    /// Timeout for each specialist call in fan-out mode, in seconds.
    pub specialist_timeout_secs: u64,
    /// Concurrent specialist calls in fan-out mode.
    pub max_concurrent_specialists: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            max_turns: 1,
            delegation: DelegationMode::Coordinator,
            total_policy: TotalScorePolicy::Recompute,
            total_tolerance: DEFAULT_TOTAL_TOLERANCE,
            reminder_retries: 0,
            specialist_timeout_secs: 90,
            max_concurrent_specialists: 4,
        }
    }
}

impl EvaluationSettings {
    /// The per-specialist timeout as a `Duration`.
    pub fn specialist_timeout(&self) -> Duration {
        Duration::from_secs(self.specialist_timeout_secs)
    }
}

impl EvalConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML file, then applies environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Applies `STREAMEVAL_*` environment variables on top of current values.
    ///
    /// # Environment Variables
    ///
    /// - `STREAMEVAL_API_BASE`: model endpoint base URL
    /// - `STREAMEVAL_API_KEY`: API key
    /// - `STREAMEVAL_MODEL`: model identifier (default: deepseek-chat)
    /// - `STREAMEVAL_TEMPERATURE`: sampling temperature (default: 0.3)
    /// - `STREAMEVAL_MAX_TOKENS`: max tokens per reply (default: 2000)
    /// - `STREAMEVAL_REQUEST_TIMEOUT_SECS`: per-call timeout (default: 120)
    /// - `STREAMEVAL_MAX_RETRIES`: transient-failure retries (default: 2)
    /// - `STREAMEVAL_MAX_TURNS`: requested turns (default: 1, capped at 1)
    /// - `STREAMEVAL_DELEGATION`: `coordinator` or `fan_out`
    /// - `STREAMEVAL_TOTAL_POLICY`: `recompute` or `trust`
    /// - `STREAMEVAL_REMINDER_RETRIES`: stricter-reminder re-asks (default: 0)
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("STREAMEVAL_API_BASE") {
            self.model.api_base = Some(val);
        }
        if let Some(val) = lookup("STREAMEVAL_API_KEY") {
            self.model.api_key = Some(val);
        }
        if let Some(val) = lookup("STREAMEVAL_MODEL") {
            self.model.model = val;
        }
        if let Some(val) = lookup("STREAMEVAL_TEMPERATURE") {
            self.model.temperature = parse_value(&val, "STREAMEVAL_TEMPERATURE")?;
        }
        if let Some(val) = lookup("STREAMEVAL_MAX_TOKENS") {
            self.model.max_tokens = parse_value(&val, "STREAMEVAL_MAX_TOKENS")?;
        }
        if let Some(val) = lookup("STREAMEVAL_REQUEST_TIMEOUT_SECS") {
            self.model.request_timeout_secs =
                parse_value(&val, "STREAMEVAL_REQUEST_TIMEOUT_SECS")?;
        }
        if let Some(val) = lookup("STREAMEVAL_MAX_RETRIES") {
            self.retry.max_retries = parse_value(&val, "STREAMEVAL_MAX_RETRIES")?;
        }
        if let Some(val) = lookup("STREAMEVAL_MAX_TURNS") {
            self.evaluation.max_turns = parse_value(&val, "STREAMEVAL_MAX_TURNS")?;
        }
        if let Some(val) = lookup("STREAMEVAL_DELEGATION") {
            self.evaluation.delegation = parse_value(&val, "STREAMEVAL_DELEGATION")?;
        }
        if let Some(val) = lookup("STREAMEVAL_TOTAL_POLICY") {
            self.evaluation.total_policy = parse_value(&val, "STREAMEVAL_TOTAL_POLICY")?;
        }
        if let Some(val) = lookup("STREAMEVAL_REMINDER_RETRIES") {
            self.evaluation.reminder_retries = parse_value(&val, "STREAMEVAL_REMINDER_RETRIES")?;
        }
        Ok(())
    }

    /// Validates value ranges. Presence of credentials is checked separately
    /// by [`ModelAccessConfig::require_complete`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.evaluation.max_turns == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_turns must be at least 1".to_string(),
            ));
        }
        if !self.evaluation.total_tolerance.is_finite() || self.evaluation.total_tolerance < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "total_tolerance must be a non-negative number".to_string(),
            ));
        }
        if self.evaluation.max_concurrent_specialists == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_specialists must be greater than 0".to_string(),
            ));
        }
        if self.evaluation.specialist_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "specialist_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder method to replace model-access settings.
    pub fn with_model_access(mut self, model: ModelAccessConfig) -> Self {
        self.model = model;
        self
    }

    /// Builder method to replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builder method to set the delegation mode.
    pub fn with_delegation(mut self, mode: DelegationMode) -> Self {
        self.evaluation.delegation = mode;
        self
    }

    /// Builder method to set the total score policy.
    pub fn with_total_policy(mut self, policy: TotalScorePolicy) -> Self {
        self.evaluation.total_policy = policy;
        self
    }

    /// Builder method to set the requested turns.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.evaluation.max_turns = max_turns;
        self
    }

    /// Builder method to set the number of stricter-reminder re-asks.
    pub fn with_reminder_retries(mut self, retries: u32) -> Self {
        self.evaluation.reminder_retries = retries;
        self
    }
}

fn parse_value<T>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert!(config.model.api_base.is_none());
        assert_eq!(config.evaluation.max_turns, 1);
        assert_eq!(config.evaluation.delegation, DelegationMode::Coordinator);
        assert_eq!(config.evaluation.total_policy, TotalScorePolicy::Recompute);
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = EvalConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("STREAMEVAL_API_BASE", "http://localhost:4000"),
                ("STREAMEVAL_API_KEY", "sk-test"),
                ("STREAMEVAL_MODEL", "gpt-4o"),
                ("STREAMEVAL_TEMPERATURE", "0.1"),
                ("STREAMEVAL_DELEGATION", "fan_out"),
                ("STREAMEVAL_TOTAL_POLICY", "trust"),
                ("STREAMEVAL_MAX_TURNS", "3"),
            ]))
            .expect("overrides should apply");

        assert_eq!(config.model.api_base.as_deref(), Some("http://localhost:4000"));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.model, "gpt-4o");
        assert!((config.model.temperature - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.evaluation.delegation, DelegationMode::FanOut);
        assert_eq!(config.evaluation.total_policy, TotalScorePolicy::Trust);
        assert_eq!(config.evaluation.max_turns, 3);
        assert!(config.model.require_complete().is_ok());
    }

    #[test]
    fn test_invalid_override_value() {
        let mut config = EvalConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("STREAMEVAL_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "STREAMEVAL_MAX_RETRIES"));
    }

    #[test]
    fn test_require_complete_reports_missing_settings() {
        let mut model = ModelAccessConfig::default();
        let err = model.require_complete().unwrap_err();
        assert!(err.to_string().contains("api_base"));

        model.api_base = Some("http://localhost:4000".to_string());
        let err = model.require_complete().unwrap_err();
        assert!(err.to_string().contains("api_key"));

        model.api_key = Some("   ".to_string());
        assert!(model.require_complete().is_err());

        model.api_key = Some("sk".to_string());
        model.model = String::new();
        let err = model.require_complete().unwrap_err();
        assert!(err.to_string().contains("model.model"));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = EvalConfig::default();
        config.model.temperature = 3.0;
        assert!(config.validate().is_err());

        let config = EvalConfig::default().with_max_turns(0);
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.evaluation.max_concurrent_specialists = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 3000,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(3000));
        assert_eq!(retry.delay_for(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_from_file_with_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "model:\n  api_base: http://localhost:8000/v1\n  api_key: sk-file\nevaluation:\n  delegation: fan_out\n  max_concurrent_specialists: 2"
        )
        .expect("write config");

        let config = EvalConfig::from_file(file.path()).expect("config should load");
        assert_eq!(config.model.api_base.as_deref(), Some("http://localhost:8000/v1"));
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert_eq!(config.evaluation.delegation, DelegationMode::FanOut);
        assert_eq!(config.evaluation.max_concurrent_specialists, 2);
        assert_eq!(config.evaluation.max_turns, 1);
    }

    #[test]
    fn test_delegation_mode_parsing() {
        assert_eq!("fan-out".parse::<DelegationMode>(), Ok(DelegationMode::FanOut));
        assert_eq!("Coordinator".parse::<DelegationMode>(), Ok(DelegationMode::Coordinator));
        assert!("swarm".parse::<DelegationMode>().is_err());
    }
}
