use serde::{Deserialize, Serialize};

/// Named policies for responding to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    RetryWithDelay,
    SkipAndContinue,
    UserIntervention,
    Alternative,
    Rollback,
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RetryWithDelay => write!(f, "retry_with_delay"),
            Self::SkipAndContinue => write!(f, "skip_and_continue"),
            Self::UserIntervention => write!(f, "user_intervention"),
            Self::Alternative => write!(f, "alternative"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// One candidate response to a classified failure. The classifier
/// attaches an ordered list of these to every error, with exactly one
/// flagged `is_recommended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub id: String,
    pub title: String,
    pub description: String,
    pub strategy: RecoveryStrategy,
    /// Strategy-specific knobs, e.g. `max_attempts` / `delay_ms` for
    /// retries or `fallback_path` for alternatives.
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub requires_user_confirmation: bool,
    pub is_recommended: bool,
    /// Seconds.
    pub estimated_time: u64,
    pub success_probability: f64,
}

impl RecoveryAction {
    pub fn new(strategy: RecoveryStrategy, title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            strategy,
            parameters: serde_json::Value::Null,
            requires_user_confirmation: false,
            is_recommended: false,
            estimated_time: 0,
            success_probability: 0.5,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_confirmation_required(mut self, required: bool) -> Self {
        self.requires_user_confirmation = required;
        self
    }

    pub fn recommended(mut self) -> Self {
        self.is_recommended = true;
        self
    }

    pub fn with_estimated_time(mut self, seconds: u64) -> Self {
        self.estimated_time = seconds;
        self
    }

    pub fn with_success_probability(mut self, probability: f64) -> Self {
        self.success_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Retry bound from `parameters.max_attempts`; defaults to 3.
    pub fn max_attempts(&self) -> u32 {
        self.parameters
            .get("max_attempts")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(3)
    }

    /// Retry spacing from `parameters.delay_ms`; defaults to 1000.
    pub fn delay_ms(&self) -> u64 {
        self.parameters
            .get("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1000)
    }
}

/// Per-error recovery state machine:
/// `open -> retrying* -> { recovered | unrecoverable }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RecoveryState {
    Open,
    Retrying { attempt: u32 },
    Recovered,
    Unrecoverable,
}

impl RecoveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Recovered | Self::Unrecoverable)
    }
}
