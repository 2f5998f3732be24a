use std::time::Duration;

use tracing::warn;

use crate::models::failure::{
    AiAnalysisErrorKind, ErrorContext, ErrorSeverity, FailureDetail, FailureKind,
    FileSystemErrorKind, NetworkErrorKind, OperationErrorKind, OrganizerError,
    ValidationErrorKind,
};
use crate::models::recovery::{RecoveryAction, RecoveryState, RecoveryStrategy};

const RETRY_DEFAULT_ATTEMPTS: u64 = 3;
const RETRY_DEFAULT_DELAY_MS: u64 = 1000;
const RETRY_LOCKED_DELAY_MS: u64 = 2000;
const RETRY_RATE_LIMIT_DELAY_MS: u64 = 5000;

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Maps a (category, kind) pair and its context to a fixed severity,
/// parameterized user-facing messages, and an ordered candidate list of
/// recovery actions with exactly one recommended. The mapping is
/// deterministic: the same kind always classifies the same way.
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(
        kind: FailureKind,
        technical_message: impl Into<String>,
        context: ErrorContext,
    ) -> OrganizerError {
        let technical_message = technical_message.into();
        let file = context.file_name().unwrap_or("the file").to_string();
        let spec = taxonomy_entry(kind, &file);
        let detail = build_detail(kind, &context);

        if spec.severity >= ErrorSeverity::Critical {
            warn!(
                operation_id = %context.operation_id,
                severity = %spec.severity,
                title = %spec.title,
                "failure requires immediate attention"
            );
        }

        OrganizerError {
            severity: spec.severity,
            title: spec.title,
            technical_message,
            user_message: spec.user_message,
            suggestion: Some(spec.suggestion),
            context,
            recovery_actions: spec.actions,
            detail,
        }
    }

    /// Classifies an I/O failure by mapping `io::ErrorKind` onto the
    /// file-system taxonomy.
    pub fn classify_io(err: &std::io::Error, context: ErrorContext) -> OrganizerError {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => FileSystemErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => FileSystemErrorKind::PermissionDenied,
            std::io::ErrorKind::StorageFull => FileSystemErrorKind::DiskSpaceInsufficient,
            std::io::ErrorKind::ResourceBusy => FileSystemErrorKind::FileLocked,
            std::io::ErrorKind::InvalidFilename => FileSystemErrorKind::PathTooLong,
            std::io::ErrorKind::InvalidData => FileSystemErrorKind::FileCorrupted,
            _ => FileSystemErrorKind::Unknown,
        };
        Self::classify(FailureKind::FileSystem(kind), err.to_string(), context)
    }

    /// Classifies an opaque executor failure. Downcasts to `io::Error`
    /// when possible; everything else resolves to the generic
    /// classification rather than being dropped.
    pub fn classify_raw(err: &anyhow::Error, context: ErrorContext) -> OrganizerError {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Self::classify_io(io_err, context);
        }
        Self::classify(
            FailureKind::Operation(OperationErrorKind::Unknown),
            format!("{err:#}"),
            context,
        )
    }
}

struct TaxonomyEntry {
    severity: ErrorSeverity,
    title: String,
    user_message: String,
    suggestion: String,
    actions: Vec<RecoveryAction>,
}

fn retry_action(delay_ms: u64) -> RecoveryAction {
    RecoveryAction::new(RecoveryStrategy::RetryWithDelay, "Retry the operation")
        .with_description("Wait briefly and try the operation again")
        .with_parameters(serde_json::json!({
            "max_attempts": RETRY_DEFAULT_ATTEMPTS,
            "delay_ms": delay_ms,
        }))
        .with_estimated_time(delay_ms * RETRY_DEFAULT_ATTEMPTS / 1000)
        .with_success_probability(0.7)
}

fn skip_action() -> RecoveryAction {
    RecoveryAction::new(RecoveryStrategy::SkipAndContinue, "Skip this file")
        .with_description("Leave this file where it is and continue with the rest of the plan")
        .with_estimated_time(1)
        .with_success_probability(0.95)
}

fn intervene_action(title: &str) -> RecoveryAction {
    RecoveryAction::new(RecoveryStrategy::UserIntervention, title)
        .with_description("Pause the plan until the problem is resolved manually")
        .with_confirmation_required(true)
        .with_estimated_time(300)
        .with_success_probability(0.9)
}

fn alternative_action(title: &str) -> RecoveryAction {
    RecoveryAction::new(RecoveryStrategy::Alternative, title)
        .with_description("Carry out the operation a different way")
        .with_estimated_time(30)
        .with_success_probability(0.6)
}

fn rollback_action() -> RecoveryAction {
    RecoveryAction::new(RecoveryStrategy::Rollback, "Undo completed steps")
        .with_description("Revert the operations that already ran in this plan")
        .with_confirmation_required(true)
        .with_estimated_time(120)
        .with_success_probability(0.8)
}

fn entry(
    severity: ErrorSeverity,
    title: &str,
    user_message: String,
    suggestion: &str,
    mut actions: Vec<RecoveryAction>,
) -> TaxonomyEntry {
    // First candidate is the recommendation.
    if let Some(first) = actions.first_mut() {
        first.is_recommended = true;
    }
    TaxonomyEntry {
        severity,
        title: title.to_string(),
        user_message,
        suggestion: suggestion.to_string(),
        actions,
    }
}

fn taxonomy_entry(kind: FailureKind, file: &str) -> TaxonomyEntry {
    use ErrorSeverity::{Critical, Error, Fatal, Warning};

    match kind {
        FailureKind::FileSystem(fs) => match fs {
            FileSystemErrorKind::FileNotFound => entry(
                Warning,
                "File not found",
                format!("{file} could not be found. It may have been moved or deleted."),
                "Skip this file, or locate it and retry",
                vec![skip_action(), intervene_action("Locate the file")],
            ),
            FileSystemErrorKind::PermissionDenied => entry(
                Error,
                "Permission denied",
                format!("You do not have permission to modify {file}."),
                "Grant access to the folder, or skip this file",
                vec![intervene_action("Grant access"), skip_action()],
            ),
            FileSystemErrorKind::DiskSpaceInsufficient => entry(
                Error,
                "Not enough disk space",
                format!("There is not enough free space to process {file}."),
                "Free up disk space, or choose a destination on another volume",
                vec![
                    intervene_action("Free up space"),
                    alternative_action("Use a different destination"),
                ],
            ),
            FileSystemErrorKind::FileLocked => entry(
                Critical,
                "File is locked",
                format!("{file} is locked by another application."),
                "Close the application using the file, then retry",
                vec![
                    retry_action(RETRY_LOCKED_DELAY_MS),
                    intervene_action("Close the other application"),
                ],
            ),
            FileSystemErrorKind::PathTooLong => entry(
                Error,
                "Destination path too long",
                format!("The destination path for {file} exceeds the system limit."),
                "Shorten the destination folder name",
                vec![
                    alternative_action("Use a shorter destination"),
                    intervene_action("Pick a new destination"),
                ],
            ),
            FileSystemErrorKind::FileCorrupted => entry(
                Critical,
                "File appears corrupted",
                format!("{file} could not be read and may be corrupted."),
                "Restore the file from a backup before retrying",
                vec![
                    intervene_action("Inspect the file"),
                    rollback_action(),
                    skip_action(),
                ],
            ),
            FileSystemErrorKind::Unknown => entry(
                Error,
                "File system error",
                format!("An unexpected file system error occurred while processing {file}."),
                "Retry, or resolve the underlying problem manually",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    intervene_action("Investigate"),
                ],
            ),
        },
        FailureKind::Network(net) => match net {
            NetworkErrorKind::Timeout => entry(
                Warning,
                "Network timeout",
                format!("The network request for {file} timed out."),
                "Retry, or continue without the remote service",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    alternative_action("Continue offline"),
                ],
            ),
            NetworkErrorKind::ConnectionRefused => entry(
                Error,
                "Connection refused",
                "The remote service refused the connection.".to_string(),
                "Check that the service is running, then retry",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    intervene_action("Check the service"),
                ],
            ),
            NetworkErrorKind::HostUnreachable => entry(
                Error,
                "Host unreachable",
                "The remote host could not be reached.".to_string(),
                "Check the network connection, or continue without the remote service",
                vec![
                    alternative_action("Continue offline"),
                    intervene_action("Check the network"),
                ],
            ),
            NetworkErrorKind::RateLimited => entry(
                Warning,
                "Rate limited",
                "The remote service is rate limiting requests.".to_string(),
                "Wait and retry, or skip the remaining remote lookups",
                vec![retry_action(RETRY_RATE_LIMIT_DELAY_MS), skip_action()],
            ),
            NetworkErrorKind::Unknown => entry(
                Error,
                "Network error",
                "An unexpected network error occurred.".to_string(),
                "Retry, or investigate the connection",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    intervene_action("Check the network"),
                ],
            ),
        },
        FailureKind::Operation(op) => match op {
            OperationErrorKind::DependencyFailed => entry(
                Error,
                "Prerequisite step failed",
                format!("A step that {file} depends on did not complete."),
                "Skip this operation, or resolve the failed prerequisite",
                vec![skip_action(), intervene_action("Resolve the prerequisite")],
            ),
            OperationErrorKind::Conflict => entry(
                Error,
                "Conflicting operation",
                format!("Another planned operation already targets the destination of {file}."),
                "Choose a different destination for one of the operations",
                vec![
                    intervene_action("Resolve the conflict"),
                    alternative_action("Use a different destination"),
                ],
            ),
            OperationErrorKind::Cancelled => entry(
                Warning,
                "Operation cancelled",
                format!("The operation on {file} was cancelled."),
                "Re-run the plan to pick up where it left off",
                vec![skip_action()],
            ),
            OperationErrorKind::RollbackFailed => entry(
                Fatal,
                "Rollback failed",
                format!("Undoing the operation on {file} failed; files may be in a mixed state."),
                "Review the affected folders manually before running anything else",
                vec![intervene_action("Review affected files")],
            ),
            OperationErrorKind::Unknown => entry(
                Error,
                "Operation failed",
                format!("The operation on {file} failed unexpectedly."),
                "Retry, or review the operation manually",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    intervene_action("Review the operation"),
                ],
            ),
        },
        FailureKind::Validation(val) => match val {
            ValidationErrorKind::MissingField => entry(
                Error,
                "Missing required value",
                "A required field was missing from the proposed operation.".to_string(),
                "Correct the proposal and resubmit it",
                vec![intervene_action("Correct the proposal"), skip_action()],
            ),
            ValidationErrorKind::InvalidValue => entry(
                Error,
                "Invalid value",
                "A field in the proposed operation had an invalid value.".to_string(),
                "Correct the proposal and resubmit it",
                vec![intervene_action("Correct the proposal"), skip_action()],
            ),
            ValidationErrorKind::Unknown => entry(
                Error,
                "Validation error",
                "The proposed operation failed validation.".to_string(),
                "Correct the proposal and resubmit it",
                vec![intervene_action("Correct the proposal")],
            ),
        },
        FailureKind::AiAnalysis(ai) => match ai {
            AiAnalysisErrorKind::LowConfidence => entry(
                Warning,
                "Low analysis confidence",
                format!("The suggestion for {file} fell below the confidence threshold."),
                "Review the suggestion, or skip this file",
                vec![intervene_action("Review the suggestion"), skip_action()],
            ),
            AiAnalysisErrorKind::ModelUnavailable => entry(
                Error,
                "Analysis model unavailable",
                "The analysis model could not be reached.".to_string(),
                "Retry, or continue with rule-based suggestions only",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    alternative_action("Continue with rule-based suggestions"),
                ],
            ),
            AiAnalysisErrorKind::MalformedResponse => entry(
                Warning,
                "Unusable analysis response",
                format!("The analysis response for {file} could not be parsed."),
                "Retry the analysis, or skip this file",
                vec![retry_action(RETRY_DEFAULT_DELAY_MS), skip_action()],
            ),
            AiAnalysisErrorKind::Unknown => entry(
                Error,
                "Analysis error",
                "An unexpected analysis error occurred.".to_string(),
                "Retry, or continue without analysis",
                vec![
                    retry_action(RETRY_DEFAULT_DELAY_MS),
                    alternative_action("Continue without analysis"),
                ],
            ),
        },
    }
}

fn param_str(context: &ErrorContext, key: &str) -> Option<String> {
    context
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn build_detail(kind: FailureKind, context: &ErrorContext) -> FailureDetail {
    match kind {
        FailureKind::FileSystem(kind) => FailureDetail::FileSystem {
            kind,
            affected_path: context.file_path.clone(),
            error_code: context
                .parameters
                .get("error_code")
                .and_then(|v| v.as_i64())
                .map(|v| v as i32),
        },
        FailureKind::Network(kind) => FailureDetail::Network {
            kind,
            endpoint: param_str(context, "endpoint"),
            http_status_code: context
                .parameters
                .get("http_status_code")
                .and_then(|v| v.as_u64())
                .map(|v| v as u16),
            retry_count: context
                .parameters
                .get("retry_count")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .unwrap_or(0),
        },
        FailureKind::Operation(kind) => FailureDetail::Operation {
            kind,
            dependent_operation_id: param_str(context, "dependent_operation_id"),
            conflicting_operation_id: param_str(context, "conflicting_operation_id"),
        },
        FailureKind::Validation(kind) => FailureDetail::Validation {
            kind,
            field_name: param_str(context, "field_name"),
            provided_value: param_str(context, "provided_value"),
            expected_value: param_str(context, "expected_value"),
        },
        FailureKind::AiAnalysis(kind) => FailureDetail::AiAnalysis {
            kind,
            model_name: param_str(context, "model_name"),
            confidence_threshold: context
                .parameters
                .get("confidence_threshold")
                .and_then(|v| v.as_f64()),
            actual_confidence: context
                .parameters
                .get("actual_confidence")
                .and_then(|v| v.as_f64()),
        },
    }
}

// ---------------------------------------------------------------------------
// Recovery tracker
// ---------------------------------------------------------------------------

/// Drives the per-error state machine
/// `open -> retrying* -> { recovered | unrecoverable }`, with the
/// attempt bound and spacing taken from the chosen action's parameters.
#[derive(Debug, Clone)]
pub struct RecoveryTracker {
    state: RecoveryState,
    max_attempts: u32,
    delay: Duration,
}

impl RecoveryTracker {
    pub fn begin(action: &RecoveryAction) -> Self {
        Self {
            state: RecoveryState::Open,
            max_attempts: action.max_attempts(),
            delay: Duration::from_millis(action.delay_ms()),
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Spacing before the next attempt; `None` once terminal.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.state.is_terminal() {
            None
        } else {
            Some(self.delay)
        }
    }

    /// Records the outcome of one attempt and returns the new state.
    pub fn record_attempt(&mut self, success: bool) -> RecoveryState {
        if self.state.is_terminal() {
            return self.state;
        }
        if success {
            self.state = RecoveryState::Recovered;
            return self.state;
        }
        let attempt = match self.state {
            RecoveryState::Retrying { attempt } => attempt + 1,
            _ => 1,
        };
        self.state = if attempt >= self.max_attempts {
            RecoveryState::Unrecoverable
        } else {
            RecoveryState::Retrying { attempt }
        };
        self.state
    }
}
