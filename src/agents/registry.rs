//! Construction of role handles and the evaluation team.
//!
//! The registry owns the shared model-access settings and provider. Building a
//! handle never touches the network; the first request is made by the
//! session. Every provider is wrapped in a [`RetryingProvider`] that bounds each
//! attempt by the request timeout.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::roles::{RoleDefinition, RoleKind};
use crate::config::{EvalConfig, ModelAccessConfig};
use crate::error::{EvalResult, LlmError};
use crate::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message, RetryingProvider};

// ============================================================================
// Agent Handle
// ============================================================================

/// A role bound to the model backend.
#[derive(Clone)]
pub struct AgentHandle {
    kind: RoleKind,
    definition: RoleDefinition,
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AgentHandle {
    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn definition(&self) -> &RoleDefinition {
        &self.definition
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `turns` to the model, preceded by the role's instruction text.
    ///
    /// An empty reply is reported as [`LlmError::EmptyResponse`].
    pub async fn complete(&self, turns: &[Message]) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        if !self.definition.instruction_text.is_empty() {
            messages.push(Message::system(self.definition.instruction_text.clone()));
        }
        messages.extend_from_slice(turns);

        let request = GenerationRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self.provider.generate(request).await?;

        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    /// Sends one user message.
    pub async fn reply(&self, content: &str) -> Result<String, LlmError> {
        self.complete(&[Message::user(content)]).await
    }
}

// ============================================================================
// Team
// ============================================================================

/// The role handles taking part in one session, keyed by role.
#[derive(Debug, Clone, Default)]
pub struct Team {
    members: BTreeMap<RoleKind, AgentHandle>,
}

impl Team {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: AgentHandle) -> Option<AgentHandle> {
        self.members.insert(handle.kind(), handle)
    }

    pub fn remove(&mut self, kind: RoleKind) -> Option<AgentHandle> {
        self.members.remove(&kind)
    }

    pub fn get(&self, kind: RoleKind) -> Option<&AgentHandle> {
        self.members.get(&kind)
    }

    pub fn contains(&self, kind: RoleKind) -> bool {
        self.members.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Team keys of all members in role order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.members.keys().map(|k| k.team_key()).collect()
    }

    pub fn roles(&self) -> impl Iterator<Item = RoleKind> + '_ {
        self.members.keys().copied()
    }
}

// ============================================================================
// Agent Registry
// ============================================================================

/// Builds role handles from shared model-access settings.
pub struct AgentRegistry {
    model: ModelAccessConfig,
    provider: Arc<dyn LlmProvider>,
}

impl AgentRegistry {
    /// Creates a registry around an existing provider.
    ///
    /// The provider is wrapped with the retry policy of `config`, and each
    /// attempt is bounded by `model.request_timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` when the endpoint, key or model id
    /// is missing.
    pub fn new(config: &EvalConfig, provider: Arc<dyn LlmProvider>) -> EvalResult<Self> {
        config.model.require_complete()?;
        let provider = RetryingProvider::new(provider, config.retry.clone())
            .with_attempt_timeout(config.model.request_timeout());
        Ok(Self {
            model: config.model.clone(),
            provider: Arc::new(provider),
        })
    }

    /// Creates a registry backed by the HTTP client.
    pub fn from_config(config: &EvalConfig) -> EvalResult<Self> {
        config.model.require_complete()?;
        let client = Arc::new(LiteLlmClient::from_config(&config.model)?);
        Self::new(config, client)
    }

    /// Builds the handle for one role.
    pub fn create_role(&self, kind: RoleKind) -> AgentHandle {
        AgentHandle {
            kind,
            definition: RoleDefinition::for_kind(kind),
            provider: Arc::clone(&self.provider),
            model: self.model.model.clone(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
        }
    }

    /// Builds the full team.
    pub fn create_team(&self) -> Team {
        let mut team = Team::new();
        for kind in RoleKind::ALL {
            team.insert(self.create_role(kind));
        }
        tracing::debug!(members = ?team.keys(), "Team assembled");
        team
    }
}
