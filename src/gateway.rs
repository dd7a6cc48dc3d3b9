//! Function-gateway adapter.
//!
//! Accepts an event of the form `{"body": "{\"content\": \"...\"}"}` and
//! answers with `{"statusCode": ..., "body": "<json>"}`. The body may also be
//! given as an already-parsed JSON object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::facade::Evaluator;
use crate::result::{ErrorEnvelope, EvaluationOutcome};

/// Gateway reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Serialized JSON document.
    pub body: String,
}

impl GatewayResponse {
    fn json(status_code: u16, body: &impl Serialize) -> Self {
        let body = serde_json::to_string(body)
            .unwrap_or_else(|e| format!(r#"{{"error":"failed to serialize body: {}"}}"#, e));
        Self { status_code, body }
    }

    fn bad_request(message: &str) -> Self {
        Self::json(400, &ErrorEnvelope::new(message))
    }
}

/// Pulls the content string out of a gateway event.
pub fn parse_event(event: &Value) -> Result<String, String> {
    let body = match event.get("body") {
        None | Some(Value::Null) => return Err("request body is missing".to_string()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map_err(|e| format!("request body is not valid JSON: {}", e))?,
        Some(other) => other.clone(),
    };

    match body.get("content").and_then(Value::as_str) {
        Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
        _ => Err("request body must contain a non-empty 'content' string".to_string()),
    }
}

/// Handles one gateway event.
pub async fn handle_event(event: &Value, evaluator: &Evaluator) -> GatewayResponse {
    let content = match parse_event(event) {
        Ok(content) => content,
        Err(message) => {
            tracing::warn!(reason = %message, "Rejecting gateway event");
            return GatewayResponse::bad_request(&message);
        }
    };

    let outcome = evaluator.evaluate(&content).await;
    let status = match &outcome {
        EvaluationOutcome::Success(_) => 200,
        EvaluationOutcome::Failure(_) => 500,
    };
    GatewayResponse::json(status, &outcome)
}
