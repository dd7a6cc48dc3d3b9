//! Result types returned by an evaluation.
//!
//! The serialized field names are part of the public JSON contract and must
//! not change: `metrics[].metricId`, `metricname`, `score`, `description`,
//! and `totalscore[].score`.

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// The four scored dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricId {
    Accuracy,
    Comprehensiveness,
    Logic,
    Professionalism,
}

impl MetricId {
    /// All dimensions in report order.
    pub const ALL: [MetricId; 4] = [
        MetricId::Accuracy,
        MetricId::Comprehensiveness,
        MetricId::Logic,
        MetricId::Professionalism,
    ];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Comprehensiveness => "comprehensiveness",
            Self::Logic => "logic",
            Self::Professionalism => "professionalism",
        }
    }

    /// Display name used in `metricname`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Accuracy => "准确性",
            Self::Comprehensiveness => "全面性",
            Self::Logic => "逻辑性",
            Self::Professionalism => "专业性",
        }
    }

    /// Parses a wire identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == id)
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-text assessment attached to a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescription {
    /// Grade such as "优秀" or "良好".
    pub level: String,
    /// Improvement suggestion.
    pub suggestion: String,
    /// Detailed assessment.
    pub evaluation: String,
}

/// Score for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Dimension identifier as produced by the model; checked by validation.
    #[serde(rename = "metricId")]
    pub metric_id: String,
    /// Display name.
    #[serde(rename = "metricname")]
    pub metric_name: String,
    /// Score, expected within 1-100.
    pub score: f64,
    pub description: MetricDescription,
}

impl MetricResult {
    /// Creates a metric for a known dimension.
    pub fn new(id: MetricId, score: f64, description: MetricDescription) -> Self {
        Self {
            metric_id: id.as_str().to_string(),
            metric_name: id.display_name().to_string(),
            score,
            description,
        }
    }

    /// The dimension, if the id is a known one.
    pub fn known_id(&self) -> Option<MetricId> {
        MetricId::from_id(&self.metric_id)
    }
}

/// Single-entry wrapper for the total score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalScore {
    pub score: f64,
}

/// A complete evaluation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metrics: Vec<MetricResult>,
    pub totalscore: Vec<TotalScore>,
}

impl EvaluationResult {
    /// Builds a report whose total is the arithmetic mean of `metrics`.
    pub fn aggregate(metrics: Vec<MetricResult>) -> Self {
        let total = mean(metrics.iter().map(|m| m.score));
        Self {
            metrics,
            totalscore: vec![TotalScore { score: total }],
        }
    }

    /// Arithmetic mean of the metric scores (0.0 when there are none).
    pub fn metric_mean(&self) -> f64 {
        mean(self.metrics.iter().map(|m| m.score))
    }

    /// The reported total, if exactly one entry is present.
    pub fn total(&self) -> Option<f64> {
        match self.totalscore.as_slice() {
            [only] => Some(only.score),
            _ => None,
        }
    }

    /// Looks up a metric by dimension.
    pub fn metric(&self, id: MetricId) -> Option<&MetricResult> {
        self.metrics.iter().find(|m| m.metric_id == id.as_str())
    }
}

fn mean(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores.fold((0.0, 0usize), |(s, c), x| (s + x, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Uniform failure document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable cause.
    pub error: String,
    /// Unparsed model reply, when one was received.
    #[serde(skip_serializing_if = "Option::is_none", alias = "rawResponse")]
    pub raw_response: Option<String>,
}

impl ErrorEnvelope {
    /// An envelope without diagnostics.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            raw_response: None,
        }
    }

    /// An envelope carrying the raw reply text.
    pub fn with_raw(error: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            raw_response: Some(raw_response.into()),
        }
    }

    /// Maps an evaluation error to its envelope.
    ///
    /// Parse and validation failures are reported as "结果解析失败", everything
    /// else as "评测流程错误".
    pub fn from_error(err: &EvalError, raw_response: Option<String>) -> Self {
        let error = match err {
            EvalError::Extraction(_) | EvalError::Validation(_) => {
                format!("结果解析失败: {}", err)
            }
            _ => format!("评测流程错误: {}", err),
        };
        Self {
            error,
            raw_response,
        }
    }
}

/// Either a report or an error envelope, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationOutcome {
    Success(EvaluationResult),
    Failure(ErrorEnvelope),
}

impl EvaluationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn result(&self) -> Option<&EvaluationResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Success(_) => None,
            Self::Failure(envelope) => Some(envelope),
        }
    }

    /// The outcome as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to serialize outcome: {}", e) })
        })
    }

    /// Pretty JSON text with non-ASCII characters preserved.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(r#"{{"error": "failed to serialize outcome: {}"}}"#, e)
        })
    }
}

impl From<EvaluationResult> for EvaluationOutcome {
    fn from(result: EvaluationResult) -> Self {
        Self::Success(result)
    }
}

impl From<ErrorEnvelope> for EvaluationOutcome {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self::Failure(envelope)
    }
}
