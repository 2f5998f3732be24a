use serde::{Deserialize, Serialize};

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Per-dimension confidence in a proposed operation, each in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub overall: f64,
    pub pattern_match: f64,
    pub user_history_alignment: f64,
    pub contextual_relevance: f64,
    pub ai_certainty: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributing_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncertainty_factors: Vec<String>,
}

impl ConfidenceMetrics {
    /// Broadcast one probability to all five dimensions.
    pub fn uniform(probability: f64) -> Self {
        let p = clamp_unit(probability);
        Self {
            overall: p,
            pattern_match: p,
            user_history_alignment: p,
            contextual_relevance: p,
            ai_certainty: p,
            contributing_factors: Vec::new(),
            uncertainty_factors: Vec::new(),
        }
    }

    pub fn scored(
        overall: f64,
        pattern_match: f64,
        user_history_alignment: f64,
        contextual_relevance: f64,
        ai_certainty: f64,
    ) -> Self {
        Self {
            overall: clamp_unit(overall),
            pattern_match: clamp_unit(pattern_match),
            user_history_alignment: clamp_unit(user_history_alignment),
            contextual_relevance: clamp_unit(contextual_relevance),
            ai_certainty: clamp_unit(ai_certainty),
            contributing_factors: Vec::new(),
            uncertainty_factors: Vec::new(),
        }
    }

    pub fn with_contributing_factor(mut self, factor: impl Into<String>) -> Self {
        self.contributing_factors.push(factor.into());
        self
    }

    pub fn with_uncertainty_factor(mut self, factor: impl Into<String>) -> Self {
        self.uncertainty_factors.push(factor.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_broadcasts_to_all_dimensions() {
        let metrics = ConfidenceMetrics::uniform(0.72);
        assert_eq!(metrics.overall, 0.72);
        assert_eq!(metrics.pattern_match, 0.72);
        assert_eq!(metrics.user_history_alignment, 0.72);
        assert_eq!(metrics.contextual_relevance, 0.72);
        assert_eq!(metrics.ai_certainty, 0.72);
    }

    #[test]
    fn test_scores_are_clamped() {
        let metrics = ConfidenceMetrics::uniform(1.4);
        assert_eq!(metrics.overall, 1.0);
        let metrics = ConfidenceMetrics::scored(-0.2, 0.5, 0.5, 0.5, 2.0);
        assert_eq!(metrics.overall, 0.0);
        assert_eq!(metrics.ai_certainty, 1.0);
    }
}
