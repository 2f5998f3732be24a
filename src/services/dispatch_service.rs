use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::PlanError;
use crate::models::failure::{ErrorContext, ErrorSeverity, FailureKind, OrganizerError};
use crate::models::operation::{OperationNode, OperationStatus};
use crate::models::recovery::{RecoveryState, RecoveryStrategy};
use crate::services::plan_service::OperationPlan;
use crate::services::progress_service::ProgressAggregator;
use crate::services::recovery_service::{ErrorClassifier, RecoveryTracker};

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

// ---------------------------------------------------------------------------
// Executor contract
// ---------------------------------------------------------------------------

/// Outcome reported by the file-system layer for one node.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Success {
        bytes_processed: u64,
        duration_secs: u64,
    },
    Failure {
        context: ErrorContext,
        error: anyhow::Error,
        /// Pre-categorized failure kind when the executor knows it
        /// (e.g. its HTTP layer saw a timeout); otherwise the raw
        /// error is classified by downcast.
        kind: Option<FailureKind>,
    },
}

/// The file-system layer. Receives read-only node snapshots and reports
/// outcomes; it never mutates plan state directly.
pub trait Executor: Send + Sync {
    fn execute(&self, node: OperationNode)
        -> impl Future<Output = ExecutionOutcome> + Send;
}

// ---------------------------------------------------------------------------
// Dispatch loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub max_concurrent: usize,
    /// Auto-apply a recommended recovery action when the failure is a
    /// warning and the action needs no confirmation.
    pub auto_recover: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            auto_recover: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
    /// A critical or fatal failure stopped the remainder of the plan;
    /// unfinished nodes are left queued pending explicit user action.
    pub halted: bool,
    pub errors: Vec<OrganizerError>,
}

/// Drives ready nodes through the executor until the plan runs dry,
/// is cancelled, or halts on a critical failure. Independent nodes run
/// concurrently; the ready set is path-collision safe by construction.
pub async fn run_plan<E>(
    plan: &mut OperationPlan,
    executor: Arc<E>,
    aggregator: &mut ProgressAggregator,
    cancel_flag: Arc<AtomicBool>,
    options: DispatchOptions,
) -> Result<DispatchReport, PlanError>
where
    E: Executor + 'static,
{
    let mut report = DispatchReport::default();

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            let cancelled = plan.cancel_all();
            info!(session_id = %plan.session_id(), cancelled, "plan cancelled");
            report.cancelled = true;
            return Ok(report);
        }

        let batch: Vec<OperationNode> = plan
            .ready_set()
            .into_iter()
            .take(options.max_concurrent.max(1))
            .cloned()
            .collect();
        if batch.is_empty() {
            return Ok(report);
        }

        let batch_ids: Vec<String> = batch.iter().map(|n| n.id.clone()).collect();
        let mut join_set = JoinSet::new();
        for node in batch {
            plan.mark_running(&node.id)?;
            let executor = executor.clone();
            join_set.spawn(async move {
                let id = node.id.clone();
                let outcome = executor.execute(node).await;
                (id, outcome)
            });
        }

        let mut halt = false;
        while let Some(joined) = join_set.join_next().await {
            let Ok((id, outcome)) = joined else {
                // A panicked executor task; the node is failed below
                // once the batch drains.
                error!(session_id = %plan.session_id(), "executor task aborted");
                continue;
            };
            match outcome {
                ExecutionOutcome::Success {
                    bytes_processed,
                    duration_secs,
                } => {
                    plan.complete(&id)?;
                    aggregator.record_success(bytes_processed, duration_secs);
                    report.succeeded += 1;
                }
                ExecutionOutcome::Failure {
                    context,
                    error,
                    kind,
                } => {
                    let classified = match kind {
                        Some(kind) => {
                            ErrorClassifier::classify(kind, format!("{error:#}"), context)
                        }
                        None => ErrorClassifier::classify_raw(&error, context),
                    };
                    halt |= handle_failure(
                        plan,
                        executor.clone(),
                        aggregator,
                        &mut report,
                        &id,
                        classified,
                        options,
                    )
                    .await?;
                }
            }
        }

        // Nodes orphaned by an aborted task are committed as failures.
        for id in batch_ids {
            if plan.node(&id).map(|n| n.status) == Some(OperationStatus::Running) {
                let context = ErrorContext::capture(id.clone(), plan.session_id(), Utc::now());
                let classified =
                    ErrorClassifier::classify_raw(&anyhow::anyhow!("executor task aborted"), context);
                commit_failure(plan, aggregator, &mut report, &id, classified)?;
            }
        }

        if halt {
            warn!(session_id = %plan.session_id(), "plan halted pending user action");
            report.halted = true;
            return Ok(report);
        }
    }
}

/// Applies the classified failure to one node. Returns true when the
/// severity demands halting the remainder of the plan.
async fn handle_failure<E>(
    plan: &mut OperationPlan,
    executor: Arc<E>,
    aggregator: &mut ProgressAggregator,
    report: &mut DispatchReport,
    id: &str,
    classified: OrganizerError,
    options: DispatchOptions,
) -> Result<bool, PlanError>
where
    E: Executor + 'static,
{
    let auto_applicable = options.auto_recover
        && classified.severity == ErrorSeverity::Warning
        && classified
            .recommended_action()
            .is_some_and(|a| !a.requires_user_confirmation);

    if let Some(action) = classified
        .recommended_action()
        .filter(|_| auto_applicable)
        .cloned()
    {
        match action.strategy {
            RecoveryStrategy::SkipAndContinue => {
                info!(operation_id = %id, "auto-skipping after recoverable failure");
                plan.skip(id)?;
                aggregator.record_skip();
                report.skipped += 1;
                report.errors.push(classified);
                return Ok(false);
            }
            RecoveryStrategy::RetryWithDelay => {
                let node = plan
                    .node(id)
                    .cloned()
                    .ok_or_else(|| PlanError::UnknownNode(id.to_string()))?;
                let mut tracker = RecoveryTracker::begin(&action);
                while let Some(delay) = tracker.next_delay() {
                    tokio::time::sleep(delay).await;
                    info!(operation_id = %id, state = ?tracker.state(), "retrying operation");
                    match executor.execute(node.clone()).await {
                        ExecutionOutcome::Success {
                            bytes_processed,
                            duration_secs,
                        } => {
                            tracker.record_attempt(true);
                            plan.complete(id)?;
                            aggregator.record_success(bytes_processed, duration_secs);
                            report.succeeded += 1;
                            return Ok(false);
                        }
                        ExecutionOutcome::Failure { .. } => {
                            if tracker.record_attempt(false) == RecoveryState::Unrecoverable {
                                break;
                            }
                        }
                    }
                }
                // Retries exhausted; fall through to commit the failure.
            }
            // Other strategies are never auto-applied.
            _ => {}
        }
    }

    let halt = classified.requires_immediate_attention();
    commit_failure(plan, aggregator, report, id, classified)?;
    Ok(halt)
}

fn commit_failure(
    plan: &mut OperationPlan,
    aggregator: &mut ProgressAggregator,
    report: &mut DispatchReport,
    id: &str,
    classified: OrganizerError,
) -> Result<(), PlanError> {
    let blocked = plan.fail(id)?;
    if !blocked.is_empty() {
        warn!(operation_id = %id, blocked = blocked.len(), "dependents paused");
    }
    aggregator.record_failure(classified.severity, classified.display_message().to_string());
    report.failed += 1;
    report.errors.push(classified);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::failure::{FileSystemErrorKind, NetworkErrorKind};
    use crate::models::operation::OperationType;
    use crate::services::plan_service::PlanBuilder;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn node(id: &str) -> OperationNode {
        OperationNode::new(OperationType::Move, format!("/src/{id}"))
            .with_id(id)
            .with_destination(format!("/organized/{id}"))
            .with_approval(true)
    }

    enum Script {
        Ok,
        FailIo(std::io::ErrorKind),
        FailKind(FailureKind),
    }

    /// Replays a per-node script; unlisted nodes succeed. Failures are
    /// consumed one at a time so retries can eventually succeed.
    struct ScriptedExecutor {
        scripts: Mutex<HashMap<String, Vec<Script>>>,
        executed: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(scripts: HashMap<String, Vec<Script>>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
                executed: Mutex::new(Vec::new()),
            }
        }

        fn executions(&self, id: &str) -> usize {
            self.executed
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.as_str() == id)
                .count()
        }
    }

    impl Executor for ScriptedExecutor {
        async fn execute(&self, node: OperationNode) -> ExecutionOutcome {
            self.executed.lock().unwrap().push(node.id.clone());
            let step = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&node.id)
                .and_then(|steps| if steps.is_empty() { None } else { Some(steps.remove(0)) });
            let context = ErrorContext::capture(&node.id, "test-session", Utc::now())
                .with_file_path(&node.source_path);
            match step {
                None | Some(Script::Ok) => ExecutionOutcome::Success {
                    bytes_processed: 1024,
                    duration_secs: 1,
                },
                Some(Script::FailIo(kind)) => ExecutionOutcome::Failure {
                    context,
                    error: anyhow::Error::from(std::io::Error::new(kind, "scripted")),
                    kind: None,
                },
                Some(Script::FailKind(kind)) => ExecutionOutcome::Failure {
                    context,
                    error: anyhow::anyhow!("scripted"),
                    kind: Some(kind),
                },
            }
        }
    }

    fn default_options() -> DispatchOptions {
        DispatchOptions::default()
    }

    async fn run(
        plan: &mut OperationPlan,
        executor: Arc<ScriptedExecutor>,
        options: DispatchOptions,
    ) -> (DispatchReport, ProgressAggregator) {
        let mut aggregator = ProgressAggregator::new("test-session", plan.len(), Utc::now());
        let report = run_plan(
            plan,
            executor,
            &mut aggregator,
            Arc::new(AtomicBool::new(false)),
            options,
        )
        .await
        .unwrap();
        (report, aggregator)
    }

    #[tokio::test]
    async fn test_dependency_chain_completes_in_order() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![
                node("a"),
                node("b").with_dependencies(vec!["a".to_string()]),
            ])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::new()));

        let (report, _) = run(&mut plan, executor.clone(), default_options()).await;
        assert_eq!(report.succeeded, 2);
        assert!(plan.is_finished());
        assert_eq!(*executor.executed.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_file_not_found_is_auto_skipped_and_blocks_dependents() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![
                node("a"),
                node("b").with_dependencies(vec!["a".to_string()]),
                node("c"),
            ])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::from([(
            "a".to_string(),
            vec![Script::FailIo(std::io::ErrorKind::NotFound)],
        )])));

        let (report, aggregator) = run(&mut plan, executor, default_options()).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.succeeded, 1);
        assert!(!report.halted);
        assert_eq!(plan.node("a").unwrap().status, OperationStatus::Skipped);
        assert_eq!(plan.node("b").unwrap().status, OperationStatus::Blocked);
        assert_eq!(plan.node("c").unwrap().status, OperationStatus::Completed);
        assert_eq!(aggregator.completed_operations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_retry_eventually_succeeds() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![node("a")])
            .unwrap();
        // Timeout classifies as a warning with retry recommended.
        let executor = Arc::new(ScriptedExecutor::new(HashMap::from([(
            "a".to_string(),
            vec![
                Script::FailKind(FailureKind::Network(NetworkErrorKind::Timeout)),
                Script::FailKind(FailureKind::Network(NetworkErrorKind::Timeout)),
                Script::Ok,
            ],
        )])));

        let (report, _) = run(&mut plan, executor.clone(), default_options()).await;
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(plan.node("a").unwrap().status, OperationStatus::Completed);
        assert_eq!(executor.executions("a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_retry_exhaustion_commits_failure() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![node("a")])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::from([(
            "a".to_string(),
            (0..10)
                .map(|_| Script::FailKind(FailureKind::Network(NetworkErrorKind::Timeout)))
                .collect(),
        )])));

        let (report, _) = run(&mut plan, executor.clone(), default_options()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(plan.node("a").unwrap().status, OperationStatus::Failed);
        // Initial attempt plus the bounded retries.
        assert_eq!(executor.executions("a"), 4);
    }

    #[tokio::test]
    async fn test_critical_failure_halts_plan() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![
                node("a"),
                node("b").with_dependencies(vec!["a".to_string()]),
                node("c").with_priority(9),
            ])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::from([(
            "a".to_string(),
            vec![Script::FailKind(FailureKind::FileSystem(
                FileSystemErrorKind::FileLocked,
            ))],
        )])));

        let options = DispatchOptions {
            max_concurrent: 1,
            auto_recover: true,
        };
        let (report, _) = run(&mut plan, executor, options).await;
        assert!(report.halted);
        assert_eq!(plan.node("a").unwrap().status, OperationStatus::Failed);
        assert_eq!(plan.node("b").unwrap().status, OperationStatus::Blocked);
        // Halting leaves the rest queued for the user to decide.
        assert_eq!(plan.node("c").unwrap().status, OperationStatus::Queued);
        assert!(report.errors[0].requires_immediate_attention());
    }

    #[tokio::test]
    async fn test_error_severity_fails_node_but_continues() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![node("a"), node("b")])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::from([(
            "a".to_string(),
            vec![Script::FailIo(std::io::ErrorKind::PermissionDenied)],
        )])));

        let options = DispatchOptions {
            max_concurrent: 1,
            auto_recover: true,
        };
        let (report, aggregator) = run(&mut plan, executor, options).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert!(!report.halted);
        assert_eq!(aggregator.snapshot(Utc::now()).error_count, 1);
    }

    #[tokio::test]
    async fn test_cancellation_before_dispatch() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![node("a"), node("b")])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::new()));
        let mut aggregator = ProgressAggregator::new("test-session", plan.len(), Utc::now());

        let report = run_plan(
            &mut plan,
            executor.clone(),
            &mut aggregator,
            Arc::new(AtomicBool::new(true)),
            default_options(),
        )
        .await
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(executor.executed.lock().unwrap().len(), 0);
        assert_eq!(plan.node("a").unwrap().status, OperationStatus::Cancelled);
        assert!(plan.is_finished());
    }

    #[tokio::test]
    async fn test_auto_recover_disabled_commits_warnings_as_failures() {
        let mut plan = PlanBuilder::new("test-session")
            .build(vec![node("a")])
            .unwrap();
        let executor = Arc::new(ScriptedExecutor::new(HashMap::from([(
            "a".to_string(),
            vec![Script::FailIo(std::io::ErrorKind::NotFound)],
        )])));

        let options = DispatchOptions {
            max_concurrent: 1,
            auto_recover: false,
        };
        let (report, _) = run(&mut plan, executor, options).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(plan.node("a").unwrap().status, OperationStatus::Failed);
    }
}
