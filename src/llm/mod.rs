//! LLM integration for stream-eval.
//!
//! The model backend is reached through the [`LlmProvider`] trait. The
//! production implementation is [`LiteLlmClient`], an OpenAI-compatible
//! chat-completion client, usually wrapped in a [`RetryingProvider`]:
//!
//! ```ignore
//! use std::sync::Arc;
//! use stream_eval::config::EvalConfig;
//! use stream_eval::llm::{LiteLlmClient, RetryingProvider};
//!
//! let config = EvalConfig::from_env()?;
//! let client = Arc::new(LiteLlmClient::from_config(&config.model)?);
//! let provider = RetryingProvider::new(client, config.retry.clone());
//! ```

pub mod litellm;
pub mod retry;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};
pub use retry::RetryingProvider;
