use indexmap::IndexMap;
use serde::Serialize;

/// A validated analysis. Built only by [`super::parse_result`]; replaced
/// wholesale on every new analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    traits: IndexMap<String, f64>,
    analysis_reasoning: AnalysisReasoning,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    adjustments: Vec<ScoreAdjustment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisReasoning {
    pub slant_score: f64,
    pub pressure_score: f64,
}

/// A score that arrived outside `[0, 1]` and was clamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreAdjustment {
    pub field: String,
    pub raw: f64,
    pub clamped: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    pub fn for_score(score: f64) -> Self {
        if score > 0.7 {
            Self::High
        } else if score > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitRow<'a> {
    pub name: &'a str,
    pub score: f64,
}

impl TraitRow<'_> {
    pub fn percent(&self) -> u8 {
        as_percent(self.score)
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::for_score(self.score)
    }
}

impl AnalysisResult {
    pub(crate) fn new(
        traits: IndexMap<String, f64>,
        analysis_reasoning: AnalysisReasoning,
        adjustments: Vec<ScoreAdjustment>,
    ) -> Self {
        Self {
            traits,
            analysis_reasoning,
            adjustments,
        }
    }

    pub fn traits(&self) -> &IndexMap<String, f64> {
        &self.traits
    }

    pub fn trait_score(&self, name: &str) -> Option<f64> {
        self.traits.get(name).copied()
    }

    /// Traits in the order the service returned them.
    pub fn trait_rows(&self) -> impl Iterator<Item = TraitRow<'_>> {
        self.traits.iter().map(|(name, score)| TraitRow {
            name: name.as_str(),
            score: *score,
        })
    }

    pub fn reasoning(&self) -> AnalysisReasoning {
        self.analysis_reasoning
    }

    pub fn adjustments(&self) -> &[ScoreAdjustment] {
        &self.adjustments
    }

    pub fn was_clamped(&self) -> bool {
        !self.adjustments.is_empty()
    }
}

impl AnalysisReasoning {
    /// Slant is displayed on a 0-100 degree scale.
    pub fn slant_degrees(&self) -> u8 {
        as_percent(self.slant_score)
    }

    pub fn pressure_percent(&self) -> u8 {
        as_percent(self.pressure_score)
    }
}

fn as_percent(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{AnalysisReasoning, AnalysisResult, ScoreBand};

    fn sample() -> AnalysisResult {
        let mut traits = IndexMap::new();
        traits.insert("Openness".to_string(), 0.826);
        traits.insert("Conscientiousness".to_string(), 0.3);
        traits.insert("Extraversion".to_string(), 0.55);
        AnalysisResult::new(
            traits,
            AnalysisReasoning {
                slant_score: 0.504,
                pressure_score: 0.6,
            },
            Vec::new(),
        )
    }

    #[test]
    fn trait_rows_keep_service_order_and_round_percent() {
        let result = sample();
        let rows: Vec<(String, u8, ScoreBand)> = result
            .trait_rows()
            .map(|row| (row.name.to_string(), row.percent(), row.band()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Openness".to_string(), 83, ScoreBand::High),
                ("Conscientiousness".to_string(), 30, ScoreBand::Low),
                ("Extraversion".to_string(), 55, ScoreBand::Medium),
            ]
        );
    }

    #[test]
    fn band_thresholds_are_exclusive() {
        assert_eq!(ScoreBand::for_score(0.7), ScoreBand::Medium);
        assert_eq!(ScoreBand::for_score(0.71), ScoreBand::High);
        assert_eq!(ScoreBand::for_score(0.4), ScoreBand::Low);
        assert_eq!(ScoreBand::for_score(0.41), ScoreBand::Medium);
    }

    #[test]
    fn reasoning_display_scales() {
        let reasoning = sample().reasoning();
        assert_eq!(reasoning.slant_degrees(), 50);
        assert_eq!(reasoning.pressure_percent(), 60);
    }

    #[test]
    fn serializes_without_empty_adjustments() -> anyhow::Result<()> {
        let value = serde_json::to_value(sample())?;
        assert!(value.get("adjustments").is_none());
        assert_eq!(value["analysis_reasoning"]["pressure_score"], 0.6);
        assert_eq!(value["traits"]["Openness"], 0.826);
        Ok(())
    }
}
