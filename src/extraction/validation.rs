//! Semantic checks on an extracted result.
//!
//! Structural violations (wrong metric set, total count, non-finite scores)
//! make a result invalid. Suspicious but usable values (scores outside
//! 1-100, a total that is not the mean) only produce warnings.

use std::collections::HashSet;

use crate::config::TotalScorePolicy;
use crate::result::{EvaluationResult, MetricId, TotalScore};

/// Lowest score the rubric allows.
pub const MIN_SCORE: f64 = 1.0;
/// Highest score the rubric allows.
pub const MAX_SCORE: f64 = 100.0;

/// Verdict of the validation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    Valid(EvaluationResult),
    Invalid {
        /// Every violation found, joined with "; ".
        reason: String,
        /// The reply the result was extracted from.
        raw_text: String,
    },
}

impl Validated {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Verdict plus non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub verdict: Validated,
    pub warnings: Vec<String>,
}

/// Validates `result`, which was extracted from `raw`.
///
/// `tolerance` bounds the accepted gap between the reported total and the
/// arithmetic mean of the metric scores.
pub fn validate(result: EvaluationResult, raw: &str, tolerance: f64) -> ValidationReport {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if result.metrics.len() != MetricId::ALL.len() {
        errors.push(format!(
            "expected {} metrics, found {}",
            MetricId::ALL.len(),
            result.metrics.len()
        ));
    }

    let mut seen: HashSet<MetricId> = HashSet::new();
    for metric in &result.metrics {
        match metric.known_id() {
            Some(id) => {
                if !seen.insert(id) {
                    errors.push(format!("duplicate metric '{}'", id));
                }
            }
            None => errors.push(format!("unknown metric '{}'", metric.metric_id)),
        }

        if !metric.score.is_finite() {
            errors.push(format!("metric '{}' has a non-finite score", metric.metric_id));
        } else if !(MIN_SCORE..=MAX_SCORE).contains(&metric.score) {
            warnings.push(format!(
                "metric '{}' score {} is outside {}-{}",
                metric.metric_id, metric.score, MIN_SCORE, MAX_SCORE
            ));
        }
    }

    for id in MetricId::ALL {
        if !seen.contains(&id) {
            errors.push(format!("missing metric '{}'", id));
        }
    }

    match result.total() {
        None => errors.push(format!(
            "expected exactly one totalscore entry, found {}",
            result.totalscore.len()
        )),
        Some(total) if !total.is_finite() => {
            errors.push("totalscore is not a finite number".to_string())
        }
        Some(total) => {
            let mean = result.metric_mean();
            if errors.is_empty() && (total - mean).abs() > tolerance {
                warnings.push(format!(
                    "totalscore {} differs from metric mean {:.4} by more than {}",
                    total, mean, tolerance
                ));
            }
        }
    }

    let verdict = if errors.is_empty() {
        Validated::Valid(result)
    } else {
        Validated::Invalid {
            reason: errors.join("; "),
            raw_text: raw.to_string(),
        }
    };

    ValidationReport { verdict, warnings }
}

/// Applies the total-score policy to a valid result.
pub fn reconcile_total(result: EvaluationResult, policy: TotalScorePolicy) -> EvaluationResult {
    match policy {
        TotalScorePolicy::Trust => result,
        TotalScorePolicy::Recompute => {
            let mean = result.metric_mean();
            EvaluationResult {
                totalscore: vec![TotalScore { score: mean }],
                ..result
            }
        }
    }
}
