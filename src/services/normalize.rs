// Response Normalization
// Maps the backend's loosely shaped JSON onto AnalysisResult

use serde_json::Value;
use tracing::debug;

use crate::models::{AnalysisResult, Verdict};

/// Outcome of normalizing one backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Classified(AnalysisResult),
    /// Neither `label` nor `prob_ai` was usable.
    Unknown { confidence: f64 },
}

impl Normalized {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            Self::Classified(result) => result,
            Self::Unknown { confidence } => AnalysisResult::new(Verdict::Unknown, confidence, None),
        }
    }
}

/// Convert `prob_ai` in [0, 1] to a whole percentage.
pub fn probability_to_percent(prob_ai: f64) -> f64 {
    (prob_ai.clamp(0.0, 1.0) * 100.0).round()
}

fn clamp_percent(val: f64) -> f64 {
    val.clamp(0.0, 100.0)
}

pub fn normalize_response(body: &Value) -> Normalized {
    let label = body
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let ai_probability = body
        .get("prob_ai")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .map(probability_to_percent);
    let confidence = body
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(clamp_percent);

    debug!(
        label = label.unwrap_or("-"),
        ai_probability = ai_probability.unwrap_or(-1.0),
        confidence = confidence.unwrap_or(-1.0),
        "normalize.fields"
    );

    // A missing confidence falls back to the rounded probability.
    let confidence_or_prob = confidence.or(ai_probability);

    match (label, ai_probability) {
        (Some(label), _) => Normalized::Classified(AnalysisResult::new(
            Verdict::Labeled(label.to_string()),
            confidence_or_prob.unwrap_or(0.0),
            ai_probability,
        )),
        (None, Some(prob)) => Normalized::Classified(AnalysisResult::new(
            Verdict::from_probability(prob),
            confidence_or_prob.unwrap_or(prob),
            Some(prob),
        )),
        (None, None) => Normalized::Unknown {
            confidence: confidence.unwrap_or(0.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probability_only() {
        let result = normalize_response(&json!({"prob_ai": 0.82})).into_result();
        assert_eq!(result.ai_probability, Some(82.0));
        assert_eq!(result.verdict, Verdict::Ai);
        assert_eq!(result.confidence, 82.0);

        let human = normalize_response(&json!({"prob_ai": 0.25})).into_result();
        assert_eq!(human.verdict, Verdict::Human);

        let unsure = normalize_response(&json!({"prob_ai": 0.5})).into_result();
        assert_eq!(unsure.verdict, Verdict::Uncertain);
    }

    #[test]
    fn test_probability_rounds_to_whole_percent() {
        let result = normalize_response(&json!({"prob_ai": 0.7049})).into_result();
        assert_eq!(result.ai_probability, Some(70.0));
        assert_eq!(result.verdict, Verdict::Uncertain);
    }

    #[test]
    fn test_label_takes_precedence() {
        let body = json!({"label": "Likely AI Generated", "confidence": 77, "prob_ai": 0.1});
        let result = normalize_response(&body).into_result();
        assert_eq!(result.verdict, Verdict::Labeled("Likely AI Generated".to_string()));
        assert_eq!(result.confidence, 77.0);
        assert_eq!(result.ai_probability, Some(10.0));
    }

    #[test]
    fn test_empty_body_is_unknown() {
        let normalized = normalize_response(&json!({}));
        assert!(normalized.is_unknown());
        let result = normalized.into_result();
        assert_eq!(result.verdict.display(), "Unknown");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.ai_probability, None);
    }

    #[test]
    fn test_unexpected_shapes_are_tolerated() {
        assert!(normalize_response(&json!([1, 2, 3])).is_unknown());
        assert!(normalize_response(&json!({"label": "", "prob_ai": "high"})).is_unknown());

        let conf_only = normalize_response(&json!({"confidence": 64.5}));
        assert_eq!(conf_only, Normalized::Unknown { confidence: 64.5 });
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let result = normalize_response(&json!({"prob_ai": 1.7, "confidence": 140})).into_result();
        assert_eq!(result.ai_probability, Some(100.0));
        assert_eq!(result.confidence, 100.0);
    }
}
