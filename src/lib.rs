//! stream-eval: multi-agent quality evaluation for live-stream content.
//!
//! A coordinator model scores a piece of content on accuracy,
//! comprehensiveness, logic and professionalism and returns a strictly typed
//! JSON report. Every failure is reported as an error envelope instead of an
//! error value.

// Core modules
pub mod agents;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod facade;
pub mod gateway;
pub mod llm;
pub mod result;

// Re-export commonly used types
pub use config::EvalConfig;
pub use error::{ConfigError, EvalError, ExtractionError, LlmError};
pub use facade::{evaluate, Evaluator};
pub use result::{
    ErrorEnvelope, EvaluationOutcome, EvaluationResult, MetricDescription, MetricId, MetricResult,
    TotalScore,
};
