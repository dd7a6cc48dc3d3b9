//! Turning a free-form coordinator reply into a typed [`EvaluationResult`].
//!
//! Extraction is strict about structure: the reply must contain a fenced JSON
//! block with `metrics` and `totalscore` that deserializes into the result
//! schema. Semantic checks (ids, counts, score ranges) live in
//! [`validation`].

pub mod fence;
pub mod validation;

pub use fence::{content_preview, locate_fenced_json};
pub use validation::{reconcile_total, validate, ValidationReport, Validated};

use serde_json::Value;

use crate::agents::roles::RoleKind;
use crate::agents::transcript::Transcript;
use crate::error::ExtractionError;
use crate::result::{EvaluationResult, MetricId, MetricResult};

/// Extracts the result from the last coordinator message of `transcript`.
pub fn extract(transcript: &Transcript) -> Result<EvaluationResult, ExtractionError> {
    let message = transcript
        .last_from(RoleKind::Coordinator)
        .ok_or(ExtractionError::NoCoordinatorMessage)?;
    extract_from_text(&message.content)
}

/// Extracts a full result from one reply text.
pub fn extract_from_text(text: &str) -> Result<EvaluationResult, ExtractionError> {
    let value = parse_fenced(text)?;

    for field in ["metrics", "totalscore"] {
        if value.get(field).is_none() {
            return Err(ExtractionError::MissingField(field));
        }
    }

    serde_json::from_value(value).map_err(|e| ExtractionError::Schema(e.to_string()))
}

/// Extracts the single metric a specialist reports for `expected`.
///
/// The reply has the specialist shape `{"metrics": [ {...} ]}`. When several
/// entries are present the one matching `expected` is taken.
pub fn extract_metric(text: &str, expected: MetricId) -> Result<MetricResult, ExtractionError> {
    let value = parse_fenced(text)?;

    let entries = value
        .get("metrics")
        .and_then(Value::as_array)
        .ok_or(ExtractionError::MissingField("metrics"))?;

    let entry = match entries.as_slice() {
        [only] => only,
        many => many
            .iter()
            .find(|e| e.get("metricId").and_then(Value::as_str) == Some(expected.as_str()))
            .ok_or_else(|| {
                ExtractionError::Schema(format!("no '{}' entry in specialist reply", expected))
            })?,
    };

    serde_json::from_value(entry.clone()).map_err(|e| ExtractionError::Schema(e.to_string()))
}

fn parse_fenced(text: &str) -> Result<Value, ExtractionError> {
    let body = locate_fenced_json(text)?;
    serde_json::from_str(body).map_err(|e| ExtractionError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"评测结果如下：
```json
{
  "metrics": [
    {"metricId": "accuracy", "metricname": "准确性", "score": 85.5,
     "description": {"level": "优秀", "suggestion": "s", "evaluation": "e"}},
    {"metricId": "comprehensiveness", "metricname": "全面性", "score": 80.0,
     "description": {"level": "良好", "suggestion": "s", "evaluation": "e"}},
    {"metricId": "logic", "metricname": "逻辑性", "score": 90.0,
     "description": {"level": "优秀", "suggestion": "s", "evaluation": "e"}},
    {"metricId": "professionalism", "metricname": "专业性", "score": 75.5,
     "description": {"level": "良好", "suggestion": "s", "evaluation": "e"}}
  ],
  "totalscore": [{"score": 82.75}]
}
```"#;

    #[test]
    fn test_extract_full_reply() {
        let result = extract_from_text(REPLY).expect("should extract");
        assert_eq!(result.metrics.len(), 4);
        assert_eq!(result.total(), Some(82.75));
        assert_eq!(result.metrics[2].metric_name, "逻辑性");
    }

    #[test]
    fn test_extract_uses_last_coordinator_message() {
        let mut transcript = Transcript::new();
        transcript.push(RoleKind::Submitter, "请直接返回JSON格式评测结果：\nhello");
        transcript.push(RoleKind::Coordinator, "no json here");
        transcript.push(RoleKind::Coordinator, REPLY);

        let result = extract(&transcript).expect("should extract");
        assert_eq!(result.metrics[0].score, 85.5);
    }

    #[test]
    fn test_extract_without_coordinator_message() {
        let mut transcript = Transcript::new();
        transcript.push(RoleKind::Submitter, "content");
        assert_eq!(
            extract(&transcript).unwrap_err(),
            ExtractionError::NoCoordinatorMessage
        );
    }

    #[test]
    fn test_invalid_json_in_fence() {
        let err = extract_from_text("```json\n{\"metrics\": [,]}\n```").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));
    }

    #[test]
    fn test_missing_totalscore() {
        let err = extract_from_text("```json\n{\"metrics\": []}\n```").unwrap_err();
        assert_eq!(err, ExtractionError::MissingField("totalscore"));
    }

    #[test]
    fn test_metric_without_score_is_schema_error() {
        let text = r#"```json
{"metrics": [{"metricId": "accuracy", "metricname": "准确性",
  "description": {"level": "优秀", "suggestion": "s", "evaluation": "e"}}],
 "totalscore": [{"score": 80.0}]}
```"#;
        let err = extract_from_text(text).unwrap_err();
        match err {
            ExtractionError::Schema(msg) => assert!(msg.contains("score")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_extract_metric_from_specialist_reply() {
        let text = r#"```json
{"metrics": [{"metricId": "logic", "metricname": "逻辑性", "score": 71.0,
  "description": {"level": "一般", "suggestion": "s", "evaluation": "e"}}]}
```"#;
        let metric = extract_metric(text, MetricId::Logic).expect("metric");
        assert_eq!(metric.known_id(), Some(MetricId::Logic));
        assert_eq!(metric.score, 71.0);
    }

    #[test]
    fn test_extract_metric_picks_matching_entry() {
        let metric = extract_metric(REPLY, MetricId::Professionalism).expect("metric");
        assert_eq!(metric.score, 75.5);
    }
}
