//! Error types for stream-eval operations.
//!
//! Defines error types for each subsystem:
//! - Model backend (LLM API) interactions
//! - Configuration loading and validation
//! - Extraction of structured results from model replies
//! - The evaluation protocol as a whole

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: STREAMEVAL_API_KEY is not configured")]
    MissingApiKey,

    #[error("Missing API base URL: STREAMEVAL_API_BASE is not configured")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned no content")]
    EmptyResponse,
}

impl LlmError {
    /// Whether a retry with the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("connection")
                    || lower.contains("temporarily")
            }
            LlmError::RateLimited(_) | LlmError::Timeout { .. } => true,
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting has no value.
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    /// A setting has a value that cannot be used.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Cross-field validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while turning a coordinator reply into a typed result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Transcript contains no coordinator message")]
    NoCoordinatorMessage,

    #[error("No fenced JSON block found in reply. Content starts with: '{content_preview}'")]
    FenceNotFound { content_preview: String },

    #[error("Fenced JSON block opened at byte {offset} is never closed")]
    UnterminatedFence { offset: usize },

    #[error("Fenced block is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Parsed result lacks required field '{0}'")]
    MissingField(&'static str),

    #[error("Parsed result does not match the result schema: {0}")]
    Schema(String),
}

/// Errors surfaced by the evaluation protocol.
///
/// None of these escape the public `evaluate` operation: the session and the
/// facade convert them into an [`ErrorEnvelope`](crate::result::ErrorEnvelope).
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid team: missing required role '{0}'")]
    InvalidTeam(String),

    #[error("Transport error: {0}")]
    Transport(#[from] LlmError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Result validation failed: {0}")]
    Validation(String),
}

/// Result type alias for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
