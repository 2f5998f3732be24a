mod error;
mod models;
mod services;

pub use error::PlanError;
pub use models::confidence::ConfidenceMetrics;
pub use models::failure::{
    AiAnalysisErrorKind, ErrorContext, ErrorSeverity, FailureDetail, FailureKind,
    FileSystemErrorKind, NetworkErrorKind, OperationErrorKind, OrganizerError,
    ValidationErrorKind,
};
pub use models::operation::{
    OperationNode, OperationStatus, OperationType, Reasoning, RollbackPlan, DEFAULT_PRIORITY,
    MAX_PRIORITY, MIN_PRIORITY,
};
pub use models::progress::{AggregateStatus, ProgressUpdate, ResourceGauges, StageRecord};
pub use models::recovery::{RecoveryAction, RecoveryState, RecoveryStrategy};
pub use models::risk::{RiskAssessment, RiskLevel};
pub use services::dispatch_service::{
    run_plan, DispatchOptions, DispatchReport, ExecutionOutcome, Executor, DEFAULT_MAX_CONCURRENT,
};
pub use services::plan_service::{OperationPlan, PlanBuilder};
pub use services::progress_service::{ProgressAggregator, RECENT_ERRORS_CAP};
pub use services::recovery_service::{ErrorClassifier, RecoveryTracker};
pub use services::scoring_service::{complexity_score, is_ready_to_execute, type_weight};
