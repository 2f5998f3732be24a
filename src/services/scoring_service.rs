use crate::models::operation::{OperationNode, OperationStatus, OperationType};

pub const BASE_COMPLEXITY: f64 = 1.0;
pub const SIZE_COMPLEXITY_CAP_MB: f64 = 5.0;
pub const RISK_COMPLEXITY_WEIGHT: f64 = 2.0;
pub const DEPENDENCY_COMPLEXITY_WEIGHT: f64 = 0.5;

/// Relative cost of each operation type in the complexity heuristic.
pub fn type_weight(op_type: OperationType) -> f64 {
    match op_type {
        OperationType::Move => 1.0,
        OperationType::Copy => 1.5,
        OperationType::Delete => 0.5,
        OperationType::Compress => 3.0,
        OperationType::Merge => 2.5,
        _ => 1.0,
    }
}

/// Cost/ordering heuristic combining type, size, risk, and declared
/// dependency count. Drives ordering and estimates only, never
/// correctness. Monotonically non-decreasing in risk score, size, and
/// dependency count.
pub fn complexity_score(node: &OperationNode) -> f64 {
    BASE_COMPLEXITY
        + type_weight(node.op_type)
        + node.estimated_size_mb().min(SIZE_COMPLEXITY_CAP_MB)
        + node.risk.score * RISK_COMPLEXITY_WEIGHT
        + DEPENDENCY_COMPLEXITY_WEIGHT * node.depends_on.len() as f64
}

/// Whether a node may be handed to the executor. `pending_dependencies`
/// is the count of declared prerequisites that have not yet completed
/// successfully; the plan tracks it separately from the declared list.
pub fn is_ready_to_execute(node: &OperationNode, pending_dependencies: usize) -> bool {
    node.is_approved
        && !node.is_rejected
        && node.status == OperationStatus::Queued
        && pending_dependencies == 0
}
