//! Fan-out delegation to the four specialists.
//!
//! Each specialist gets its own sub-request. At most `max_concurrent` calls
//! run at once and each one is bounded by its own timeout. The replies are
//! combined by [`aggregate_metrics`], which has no I/O.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::registry::AgentHandle;
use super::roles::RoleKind;
use crate::error::{EvalError, ExtractionError, LlmError};
use crate::extraction::extract_metric;
use crate::result::{EvaluationResult, MetricResult};

/// Raw outcome of one specialist call.
#[derive(Debug)]
pub struct SpecialistReply {
    pub kind: RoleKind,
    pub reply: Result<String, LlmError>,
}

/// Sends `instruction` to every specialist concurrently.
///
/// Replies are returned in the order of `specialists`.
pub async fn fan_out(
    specialists: &[AgentHandle],
    instruction: &str,
    max_concurrent: usize,
    timeout: Duration,
) -> Vec<SpecialistReply> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let calls = specialists.iter().map(|handle| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore.acquire().await.ok();
            tracing::debug!(role = %handle.kind(), "Delegating to specialist");

            let reply = match tokio::time::timeout(timeout, handle.reply(instruction)).await {
                Ok(reply) => reply,
                Err(_) => Err(LlmError::Timeout {
                    seconds: timeout.as_secs(),
                }),
            };

            SpecialistReply {
                kind: handle.kind(),
                reply,
            }
        }
    });

    futures::future::join_all(calls).await
}

/// Parses one specialist reply into its metric.
pub fn parse_specialist_reply(kind: RoleKind, text: &str) -> Result<MetricResult, EvalError> {
    let expected = kind
        .metric()
        .ok_or_else(|| EvalError::InvalidTeam(format!("{} is not a specialist", kind.team_key())))?;

    let metric = extract_metric(text, expected)?;
    if metric.known_id() != Some(expected) {
        return Err(ExtractionError::Schema(format!(
            "{} returned metric '{}'",
            kind.team_key(),
            metric.metric_id
        ))
        .into());
    }
    Ok(metric)
}

/// Combines per-specialist metrics into a full report.
///
/// Metrics are ordered by dimension and the total is their arithmetic mean.
pub fn aggregate_metrics(mut metrics: Vec<MetricResult>) -> EvaluationResult {
    metrics.sort_by_key(|m| m.known_id());
    EvaluationResult::aggregate(metrics)
}
