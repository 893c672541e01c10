use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use super::model::{AnalysisReasoning, AnalysisResult, ScoreAdjustment};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("response is missing required field '{field}'")]
    MissingField { field: String },

    #[error("score '{field}' is outside [0, 1]: {value}")]
    OutOfRange { field: String, value: f64 },
}

impl ValidationError {
    fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// What to do with a score outside `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScorePolicy {
    /// Clamp into range and record a [`ScoreAdjustment`].
    #[default]
    Clamp,
    Reject,
}

/// Validates an analysis response body with the default clamp policy.
pub fn parse_result(raw: &Value) -> Result<AnalysisResult, ValidationError> {
    parse_result_with(raw, ScorePolicy::Clamp)
}

pub fn parse_result_with(
    raw: &Value,
    policy: ScorePolicy,
) -> Result<AnalysisResult, ValidationError> {
    let root = raw
        .as_object()
        .ok_or_else(|| ValidationError::missing("traits"))?;
    let mut adjustments = Vec::new();

    let raw_traits = root
        .get("traits")
        .and_then(Value::as_object)
        .ok_or_else(|| ValidationError::missing("traits"))?;
    let mut traits = IndexMap::with_capacity(raw_traits.len());
    for (name, value) in raw_traits {
        let field = format!("traits.{name}");
        let score = checked_score(&field, value.as_f64(), policy, &mut adjustments)?;
        traits.insert(name.clone(), score);
    }

    let reasoning = root
        .get("analysis_reasoning")
        .and_then(Value::as_object)
        .ok_or_else(|| ValidationError::missing("analysis_reasoning"))?;
    let slant_score = reasoning_score(reasoning, "slant_score", policy, &mut adjustments)?;
    let pressure_score = reasoning_score(reasoning, "pressure_score", policy, &mut adjustments)?;

    Ok(AnalysisResult::new(
        traits,
        AnalysisReasoning {
            slant_score,
            pressure_score,
        },
        adjustments,
    ))
}

fn reasoning_score(
    reasoning: &Map<String, Value>,
    key: &str,
    policy: ScorePolicy,
    adjustments: &mut Vec<ScoreAdjustment>,
) -> Result<f64, ValidationError> {
    let field = format!("analysis_reasoning.{key}");
    let value = reasoning.get(key).and_then(Value::as_f64);
    checked_score(&field, value, policy, adjustments)
}

fn checked_score(
    field: &str,
    value: Option<f64>,
    policy: ScorePolicy,
    adjustments: &mut Vec<ScoreAdjustment>,
) -> Result<f64, ValidationError> {
    let Some(raw) = value.filter(|value| value.is_finite()) else {
        return Err(ValidationError::missing(field));
    };
    if (0.0..=1.0).contains(&raw) {
        return Ok(raw);
    }
    match policy {
        ScorePolicy::Reject => Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: raw,
        }),
        ScorePolicy::Clamp => {
            let clamped = raw.clamp(0.0, 1.0);
            adjustments.push(ScoreAdjustment {
                field: field.to_string(),
                raw,
                clamped,
            });
            Ok(clamped)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_result, parse_result_with, ScorePolicy, ValidationError};

    fn missing(field: &str) -> ValidationError {
        ValidationError::MissingField {
            field: field.to_string(),
        }
    }

    #[test]
    fn parses_complete_response_exactly() -> anyhow::Result<()> {
        let raw = json!({
            "traits": {"Openness": 0.8, "Conscientiousness": 0.3},
            "analysis_reasoning": {"slant_score": 0.5, "pressure_score": 0.6},
        });
        let result = parse_result(&raw)?;
        assert_eq!(result.trait_score("Openness"), Some(0.8));
        assert_eq!(result.trait_score("Conscientiousness"), Some(0.3));
        assert_eq!(result.traits().len(), 2);
        assert_eq!(result.reasoning().slant_score, 0.5);
        assert_eq!(result.reasoning().pressure_score, 0.6);
        assert!(!result.was_clamped());
        Ok(())
    }

    #[test]
    fn missing_reasoning_is_missing_field() {
        let raw = json!({"traits": {"Openness": 0.8}});
        assert_eq!(parse_result(&raw), Err(missing("analysis_reasoning")));
    }

    #[test]
    fn missing_or_malformed_traits_is_missing_field() {
        let reasoning = json!({"slant_score": 0.5, "pressure_score": 0.6});
        assert_eq!(
            parse_result(&json!({"analysis_reasoning": reasoning})),
            Err(missing("traits"))
        );
        assert_eq!(
            parse_result(&json!({"traits": [0.1], "analysis_reasoning": reasoning})),
            Err(missing("traits"))
        );
        assert_eq!(
            parse_result(&json!({"traits": {"Openness": "high"}, "analysis_reasoning": reasoning})),
            Err(missing("traits.Openness"))
        );
        assert_eq!(parse_result(&json!("not an object")), Err(missing("traits")));
    }

    #[test]
    fn reasoning_scores_must_be_numeric() {
        let raw = json!({
            "traits": {},
            "analysis_reasoning": {"slant_score": "0.5", "pressure_score": 0.6},
        });
        assert_eq!(
            parse_result(&raw),
            Err(missing("analysis_reasoning.slant_score"))
        );

        let raw = json!({
            "traits": {},
            "analysis_reasoning": {"slant_score": 0.5},
        });
        assert_eq!(
            parse_result(&raw),
            Err(missing("analysis_reasoning.pressure_score"))
        );
    }

    #[test]
    fn out_of_range_scores_are_clamped_and_recorded() -> anyhow::Result<()> {
        let raw = json!({
            "traits": {"Openness": 1.4, "Neuroticism": -0.2},
            "analysis_reasoning": {"slant_score": 1.4, "pressure_score": 0.6},
        });
        let result = parse_result(&raw)?;
        assert_eq!(result.trait_score("Openness"), Some(1.0));
        assert_eq!(result.trait_score("Neuroticism"), Some(0.0));
        assert_eq!(result.reasoning().slant_score, 1.0);

        let fields: Vec<&str> = result
            .adjustments()
            .iter()
            .map(|adjustment| adjustment.field.as_str())
            .collect();
        assert_eq!(
            fields,
            vec![
                "traits.Openness",
                "traits.Neuroticism",
                "analysis_reasoning.slant_score"
            ]
        );
        assert_eq!(result.adjustments()[0].raw, 1.4);
        Ok(())
    }

    #[test]
    fn reject_policy_reports_out_of_range() {
        let raw = json!({
            "traits": {"Openness": 0.2},
            "analysis_reasoning": {"slant_score": 0.5, "pressure_score": 1.4},
        });
        assert_eq!(
            parse_result_with(&raw, ScorePolicy::Reject),
            Err(ValidationError::OutOfRange {
                field: "analysis_reasoning.pressure_score".to_string(),
                value: 1.4,
            })
        );
    }

    #[test]
    fn unknown_fields_are_ignored() -> anyhow::Result<()> {
        let raw = json!({
            "traits": {"Openness": 0.8},
            "analysis_reasoning": {
                "slant_score": 0.5,
                "pressure_score": 0.6,
                "baseline": "straight",
            },
            "model_version": "2.1",
        });
        let result = parse_result(&raw)?;
        assert_eq!(result.traits().len(), 1);
        Ok(())
    }

    #[test]
    fn integer_scores_are_numbers() -> anyhow::Result<()> {
        let raw = json!({
            "traits": {"Openness": 1, "Agreeableness": 0},
            "analysis_reasoning": {"slant_score": 0, "pressure_score": 1},
        });
        let result = parse_result(&raw)?;
        assert_eq!(result.trait_score("Openness"), Some(1.0));
        assert!(!result.was_clamped());
        Ok(())
    }
}
