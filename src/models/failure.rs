use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::operation::OperationType;
use crate::models::recovery::RecoveryAction;

/// Immutable snapshot captured at failure time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub operation_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_type: Option<OperationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl ErrorContext {
    /// `at` is passed explicitly so captures stay deterministic in tests.
    pub fn capture(
        operation_id: impl Into<String>,
        session_id: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            session_id: session_id.into(),
            timestamp: at,
            ..Self::default()
        }
    }

    pub fn with_op_type(mut self, op_type: OperationType) -> Self {
        self.op_type = Some(op_type);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Base name of the failing file, for user-facing messages.
    pub fn file_name(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .and_then(|p| p.rsplit(['/', '\\']).next())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
    Fatal,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSystemErrorKind {
    FileNotFound,
    PermissionDenied,
    DiskSpaceInsufficient,
    FileLocked,
    PathTooLong,
    FileCorrupted,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionRefused,
    HostUnreachable,
    RateLimited,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationErrorKind {
    DependencyFailed,
    Conflict,
    Cancelled,
    RollbackFailed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingField,
    InvalidValue,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiAnalysisErrorKind {
    LowConfidence,
    ModelUnavailable,
    MalformedResponse,
    Unknown,
}

/// Category + kind pair fed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    FileSystem(FileSystemErrorKind),
    Network(NetworkErrorKind),
    Operation(OperationErrorKind),
    Validation(ValidationErrorKind),
    AiAnalysis(AiAnalysisErrorKind),
}

/// Category-specific payload of a classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum FailureDetail {
    FileSystem {
        kind: FileSystemErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<i32>,
    },
    Network {
        kind: NetworkErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_status_code: Option<u16>,
        #[serde(default)]
        retry_count: u32,
    },
    Operation {
        kind: OperationErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dependent_operation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conflicting_operation_id: Option<String>,
    },
    Validation {
        kind: ValidationErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provided_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_value: Option<String>,
    },
    AiAnalysis {
        kind: AiAnalysisErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence_threshold: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual_confidence: Option<f64>,
    },
}

impl FailureDetail {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::FileSystem { kind, .. } => FailureKind::FileSystem(*kind),
            Self::Network { kind, .. } => FailureKind::Network(*kind),
            Self::Operation { kind, .. } => FailureKind::Operation(*kind),
            Self::Validation { kind, .. } => FailureKind::Validation(*kind),
            Self::AiAnalysis { kind, .. } => FailureKind::AiAnalysis(*kind),
        }
    }
}

/// A fully classified execution failure: severity, messages, the
/// captured context, and the ranked recovery actions. Produced by the
/// classifier, consumed by the recovery flow and the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizerError {
    pub severity: ErrorSeverity,
    pub title: String,
    pub technical_message: String,
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub context: ErrorContext,
    pub recovery_actions: Vec<RecoveryAction>,
    pub detail: FailureDetail,
}

impl OrganizerError {
    /// The single action flagged recommended.
    pub fn recommended_action(&self) -> Option<&RecoveryAction> {
        self.recovery_actions.iter().find(|a| a.is_recommended)
    }

    pub fn is_recoverable(&self) -> bool {
        !self.recovery_actions.is_empty()
    }

    pub fn requires_immediate_attention(&self) -> bool {
        self.severity >= ErrorSeverity::Critical
    }

    /// Prefers the user-facing message over the technical one.
    pub fn display_message(&self) -> &str {
        if self.user_message.is_empty() {
            &self.technical_message
        } else {
            &self.user_message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recovery::RecoveryStrategy;

    fn sample_error(severity: ErrorSeverity) -> OrganizerError {
        OrganizerError {
            severity,
            title: "File not found".to_string(),
            technical_message: "ENOENT".to_string(),
            user_message: "report.pdf could not be found".to_string(),
            suggestion: None,
            context: ErrorContext::capture("op-1", "session-1", Utc::now()),
            recovery_actions: vec![
                RecoveryAction::new(RecoveryStrategy::SkipAndContinue, "Skip").recommended(),
                RecoveryAction::new(RecoveryStrategy::UserIntervention, "Locate"),
            ],
            detail: FailureDetail::FileSystem {
                kind: FileSystemErrorKind::FileNotFound,
                affected_path: Some("/downloads/report.pdf".to_string()),
                error_code: None,
            },
        }
    }

    #[test]
    fn test_recommended_action_is_the_flagged_one() {
        let err = sample_error(ErrorSeverity::Warning);
        let action = err.recommended_action().unwrap();
        assert_eq!(action.strategy, RecoveryStrategy::SkipAndContinue);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_immediate_attention_threshold() {
        assert!(!sample_error(ErrorSeverity::Warning).requires_immediate_attention());
        assert!(!sample_error(ErrorSeverity::Error).requires_immediate_attention());
        assert!(sample_error(ErrorSeverity::Critical).requires_immediate_attention());
        assert!(sample_error(ErrorSeverity::Fatal).requires_immediate_attention());
    }

    #[test]
    fn test_display_message_prefers_user_facing() {
        let mut err = sample_error(ErrorSeverity::Warning);
        assert_eq!(err.display_message(), "report.pdf could not be found");
        err.user_message.clear();
        assert_eq!(err.display_message(), "ENOENT");
    }

    #[test]
    fn test_detail_tag_round_trip() {
        let err = sample_error(ErrorSeverity::Warning);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"category\":\"file_system\""));
        assert!(json.contains("\"kind\":\"file_not_found\""));
        let decoded: OrganizerError = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, err);
    }

    #[test]
    fn test_context_file_name() {
        let ctx = ErrorContext::capture("op-1", "s-1", Utc::now())
            .with_file_path("/downloads/report.pdf");
        assert_eq!(ctx.file_name(), Some("report.pdf"));
    }
}
