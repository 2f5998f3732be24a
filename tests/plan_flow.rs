//! End-to-end flow: build a plan from proposed operations, drive it
//! through a real file-moving executor against a scratch directory, and
//! check the final plan, report, and progress snapshot agree.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use tidyplan::{
    run_plan, ConfidenceMetrics, DispatchOptions, ErrorContext, ExecutionOutcome, Executor,
    OperationNode, OperationStatus, OperationType, PlanBuilder, ProgressAggregator,
    RiskAssessment,
};

/// Moves real files with std::fs; failures surface as raw I/O errors
/// the way a production file-system layer would report them.
struct FsMoveExecutor {
    session_id: String,
}

impl Executor for FsMoveExecutor {
    async fn execute(&self, node: OperationNode) -> ExecutionOutcome {
        let context = ErrorContext::capture(&node.id, &self.session_id, Utc::now())
            .with_op_type(node.op_type)
            .with_file_path(&node.source_path);
        let Some(dest) = node.destination_path.as_deref() else {
            return ExecutionOutcome::Failure {
                context,
                error: anyhow::anyhow!("move without destination"),
                kind: None,
            };
        };
        let bytes = match fs::metadata(&node.source_path) {
            Ok(meta) => meta.len(),
            Err(err) => {
                return ExecutionOutcome::Failure {
                    context,
                    error: anyhow::Error::from(err),
                    kind: None,
                }
            }
        };
        if let Some(parent) = PathBuf::from(dest).parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                return ExecutionOutcome::Failure {
                    context,
                    error: anyhow::Error::from(err),
                    kind: None,
                };
            }
        }
        match fs::rename(&node.source_path, dest) {
            Ok(()) => ExecutionOutcome::Success {
                bytes_processed: bytes,
                duration_secs: 0,
            },
            Err(err) => ExecutionOutcome::Failure {
                context,
                error: anyhow::Error::from(err),
                kind: None,
            },
        }
    }
}

fn move_node(id: &str, source: &PathBuf, dest: &PathBuf) -> OperationNode {
    OperationNode::new(OperationType::Move, source.to_string_lossy())
        .with_id(id)
        .with_destination(dest.to_string_lossy())
        .with_confidence(ConfidenceMetrics::uniform(0.9))
        .with_risk(RiskAssessment::low())
        .with_approval(true)
}

#[tokio::test]
async fn moves_files_and_skips_missing_ones() {
    let dir = tempfile::tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let organized = dir.path().join("organized");
    fs::create_dir_all(&downloads).unwrap();

    let report_src = downloads.join("report.pdf");
    let photo_src = downloads.join("photo.jpg");
    let ghost_src = downloads.join("ghost.txt");
    fs::write(&report_src, b"quarterly numbers").unwrap();
    fs::write(&photo_src, b"jpeg bytes").unwrap();
    // ghost.txt is intentionally never created.

    let nodes = vec![
        move_node("report", &report_src, &organized.join("documents/report.pdf")),
        move_node("photo", &photo_src, &organized.join("images/photo.jpg")),
        move_node("ghost", &ghost_src, &organized.join("documents/ghost.txt")),
    ];

    let mut plan = PlanBuilder::new("e2e").build(nodes).unwrap();
    let mut aggregator = ProgressAggregator::new("e2e", plan.len(), Utc::now());
    aggregator.begin_stage("moving", Utc::now());

    let report = run_plan(
        &mut plan,
        Arc::new(FsMoveExecutor {
            session_id: "e2e".to_string(),
        }),
        &mut aggregator,
        Arc::new(AtomicBool::new(false)),
        DispatchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded, 2);
    // The missing file classifies as a warning and is auto-skipped.
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.halted && !report.cancelled);

    assert!(organized.join("documents/report.pdf").exists());
    assert!(organized.join("images/photo.jpg").exists());
    assert!(!report_src.exists());
    assert_eq!(plan.node("ghost").unwrap().status, OperationStatus::Skipped);
    assert!(plan.is_finished());

    let err = &report.errors[0];
    assert!(err.user_message.contains("ghost.txt"));
    assert!(err.is_recoverable());

    aggregator.finish_stages(Utc::now());
    let snapshot = aggregator.snapshot(Utc::now());
    assert_eq!(snapshot.completed_operations, 3);
    assert_eq!(snapshot.succeeded, 2);
    assert_eq!(snapshot.skipped, 1);
    assert_eq!(snapshot.percentage, 100.0);
    assert_eq!(snapshot.completed_stages.len(), 1);

    // The snapshot round-trips through the persistence wire shape.
    let json = serde_json::to_string(&snapshot).unwrap();
    let decoded: tidyplan::ProgressUpdate = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, snapshot);
}

#[tokio::test]
async fn dependent_moves_run_after_their_prerequisite() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let archive = dir.path().join("archive");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("a.txt"), b"a").unwrap();

    // b moves the file a staging step put in place first.
    let staged = archive.join("staged/a.txt");
    let final_dest = archive.join("final/a.txt");
    let nodes = vec![
        move_node("stage", &inbox.join("a.txt"), &staged),
        move_node("finalize", &staged, &final_dest)
            .with_dependencies(vec!["stage".to_string()]),
    ];

    let mut plan = PlanBuilder::new("e2e-deps").build(nodes).unwrap();
    let mut aggregator = ProgressAggregator::new("e2e-deps", plan.len(), Utc::now());
    let report = run_plan(
        &mut plan,
        Arc::new(FsMoveExecutor {
            session_id: "e2e-deps".to_string(),
        }),
        &mut aggregator,
        Arc::new(AtomicBool::new(false)),
        DispatchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(final_dest.exists());
    assert!(!staged.exists());
}
