use serde::{Deserialize, Serialize};

/// Ordered risk levels; derived `Ord` follows declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryLow => write!(f, "very_low"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: f64,
    pub requires_confirmation: bool,
    pub is_reversible: bool,
    /// Seconds.
    pub estimated_recovery_time: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mitigations: Vec<String>,
}

impl RiskAssessment {
    /// Reversible, no confirmation needed.
    pub fn low() -> Self {
        Self {
            level: RiskLevel::Low,
            score: 0.2,
            requires_confirmation: false,
            is_reversible: true,
            estimated_recovery_time: 30,
            risks: Vec::new(),
            mitigations: Vec::new(),
        }
    }

    /// Reversible but confirmation-gated.
    pub fn medium() -> Self {
        Self {
            level: RiskLevel::Medium,
            score: 0.5,
            requires_confirmation: true,
            is_reversible: true,
            estimated_recovery_time: 120,
            risks: Vec::new(),
            mitigations: Vec::new(),
        }
    }

    /// Irreversible; always confirmation-gated.
    pub fn high() -> Self {
        Self {
            level: RiskLevel::High,
            score: 0.8,
            requires_confirmation: true,
            is_reversible: false,
            estimated_recovery_time: 600,
            risks: Vec::new(),
            mitigations: Vec::new(),
        }
    }

    pub fn custom(
        level: RiskLevel,
        score: f64,
        requires_confirmation: bool,
        is_reversible: bool,
        estimated_recovery_time: u64,
    ) -> Self {
        Self {
            level,
            score: score.clamp(0.0, 1.0),
            requires_confirmation,
            is_reversible,
            estimated_recovery_time,
            risks: Vec::new(),
            mitigations: Vec::new(),
        }
    }

    pub fn with_risk(mut self, risk: impl Into<String>) -> Self {
        self.risks.push(risk.into());
        self
    }

    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigations.push(mitigation.into());
        self
    }
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self::low()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(RiskLevel::VeryLow < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_presets() {
        let low = RiskAssessment::low();
        assert_eq!(low.score, 0.2);
        assert!(!low.requires_confirmation);
        assert!(low.is_reversible);

        let medium = RiskAssessment::medium();
        assert_eq!(medium.score, 0.5);
        assert!(medium.requires_confirmation);
        assert!(medium.is_reversible);

        let high = RiskAssessment::high();
        assert_eq!(high.score, 0.8);
        assert!(high.requires_confirmation);
        assert!(!high.is_reversible);
    }

    #[test]
    fn test_custom_clamps_score() {
        let custom = RiskAssessment::custom(RiskLevel::Critical, 1.7, true, false, 0);
        assert_eq!(custom.score, 1.0);
    }
}
