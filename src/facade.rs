//! The single public evaluation operation.
//!
//! ```ignore
//! use stream_eval::facade::Evaluator;
//! use stream_eval::config::EvalConfig;
//!
//! let evaluator = Evaluator::new(EvalConfig::from_env()?);
//! let outcome = evaluator.evaluate("主播正在讲解新款手机的参数").await;
//! println!("{}", outcome.to_json_pretty());
//! ```

use std::sync::Arc;

use crate::agents::{AgentRegistry, ConversationSession};
use crate::config::EvalConfig;
use crate::error::{EvalError, EvalResult};
use crate::llm::LlmProvider;
use crate::result::{ErrorEnvelope, EvaluationOutcome};

/// Runs evaluations with one configuration.
///
/// Without an injected provider each evaluation builds the HTTP client from
/// the configuration. Every call gets fresh handles and a fresh transcript.
pub struct Evaluator {
    config: EvalConfig,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            provider: None,
        }
    }

    /// Uses `provider` instead of the HTTP client.
    pub fn with_provider(config: EvalConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluates `content`. Never fails: errors come back as an envelope.
    pub async fn evaluate(&self, content: &str) -> EvaluationOutcome {
        let mut session = match self.prepare() {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = %err, "Cannot start evaluation");
                return ErrorEnvelope::from_error(&err, None).into();
            }
        };

        session
            .run(content, self.config.evaluation.max_turns)
            .await
    }

    fn prepare(&self) -> EvalResult<ConversationSession> {
        let registry = match &self.provider {
            Some(provider) => AgentRegistry::new(&self.config, Arc::clone(provider))?,
            None => AgentRegistry::from_config(&self.config)?,
        };
        ConversationSession::new(registry.create_team(), self.config.evaluation.clone())
    }
}

/// Evaluates `content` with configuration taken from the environment.
pub async fn evaluate(content: &str) -> EvaluationOutcome {
    match EvalConfig::from_env() {
        Ok(config) => Evaluator::new(config).evaluate(content).await,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            ErrorEnvelope::from_error(&EvalError::from(err), None).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelAccessConfig;

    #[tokio::test]
    async fn test_missing_settings_become_envelope() {
        let evaluator = Evaluator::new(EvalConfig::default());
        let outcome = evaluator.evaluate("content").await;

        let envelope = outcome.error().expect("failure");
        assert!(envelope.error.contains("model.api_base"));
        assert!(envelope.raw_response.is_none());
    }

    #[tokio::test]
    async fn test_missing_model_id_is_reported() {
        let mut model = ModelAccessConfig::new("http://localhost:1/v1", "sk-test", "");
        model.model = "  ".to_string();
        let evaluator = Evaluator::new(EvalConfig::default().with_model_access(model));

        let outcome = evaluator.evaluate("content").await;
        assert!(outcome.error().expect("failure").error.contains("model.model"));
    }
}
