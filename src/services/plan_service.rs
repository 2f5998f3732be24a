use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::error::PlanError;
use crate::models::operation::{
    OperationNode, OperationStatus, MAX_PRIORITY, MIN_PRIORITY,
};
use crate::services::scoring_service;

// ---------------------------------------------------------------------------
// Plan builder
// ---------------------------------------------------------------------------

/// Validates a batch of proposed operations into an executable plan.
/// Construction fails fast: a dangling dependency id, a dependency
/// cycle, or an out-of-range priority aborts the whole batch and no
/// node ever becomes ready.
pub struct PlanBuilder {
    session_id: String,
}

impl PlanBuilder {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn build(self, nodes: Vec<OperationNode>) -> Result<OperationPlan, PlanError> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(PlanError::DuplicateId(node.id.clone()));
            }
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&node.priority) {
                return Err(PlanError::PriorityOutOfRange {
                    operation_id: node.id.clone(),
                    priority: node.priority,
                });
            }
            if !(0.0..=100.0).contains(&node.progress_percentage) {
                return Err(PlanError::ProgressOutOfRange {
                    operation_id: node.id.clone(),
                    progress: node.progress_percentage,
                });
            }
        }

        // Adjacency built once: prerequisites per node, merging the
        // inverse `enables` edges into the same relation.
        let mut prerequisites: Vec<HashSet<usize>> = vec![HashSet::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for dep_id in &node.depends_on {
                let Some(&dep) = index.get(dep_id) else {
                    return Err(PlanError::DanglingDependency {
                        operation_id: node.id.clone(),
                        missing_id: dep_id.clone(),
                    });
                };
                prerequisites[i].insert(dep);
            }
            for enabled_id in &node.enables {
                let Some(&enabled) = index.get(enabled_id) else {
                    return Err(PlanError::DanglingDependency {
                        operation_id: node.id.clone(),
                        missing_id: enabled_id.clone(),
                    });
                };
                prerequisites[enabled].insert(i);
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (i, prereqs) in prerequisites.iter().enumerate() {
            for &dep in prereqs {
                dependents[dep].push(i);
            }
        }

        detect_cycle(&nodes, &prerequisites, &dependents)?;

        info!(
            session_id = %self.session_id,
            operations = nodes.len(),
            "plan constructed"
        );

        Ok(OperationPlan {
            session_id: self.session_id,
            nodes,
            index,
            dependents,
            pending: prerequisites,
        })
    }
}

/// Kahn's algorithm; any node left unprocessed sits on a cycle.
fn detect_cycle(
    nodes: &[OperationNode],
    prerequisites: &[HashSet<usize>],
    dependents: &[Vec<usize>],
) -> Result<(), PlanError> {
    let mut in_degree: Vec<usize> = prerequisites.iter().map(HashSet::len).collect();
    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut processed = 0usize;
    while let Some(i) = queue.pop_front() {
        processed += 1;
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if processed == nodes.len() {
        return Ok(());
    }
    let cycle_ids = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d > 0)
        .map(|(i, _)| nodes[i].id.clone())
        .collect();
    Err(PlanError::DependencyCycle(cycle_ids))
}

// ---------------------------------------------------------------------------
// Operation plan
// ---------------------------------------------------------------------------

/// A validated plan. Exclusively owns its nodes: executors get cloned
/// snapshots and report outcomes back through the mutation methods here.
/// Arena order is submission order.
#[derive(Debug)]
pub struct OperationPlan {
    session_id: String,
    nodes: Vec<OperationNode>,
    index: HashMap<String, usize>,
    /// Edges prerequisite -> dependents, fixed at construction.
    dependents: Vec<Vec<usize>>,
    /// Prerequisites not yet completed successfully, per node. Shrinks
    /// as nodes complete; the declared `depends_on` lists never change.
    pending: Vec<HashSet<usize>>,
}

impl OperationPlan {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&OperationNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[OperationNode] {
        &self.nodes
    }

    pub fn pending_dependencies(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|&i| self.pending[i].len())
    }

    fn idx(&self, id: &str) -> Result<usize, PlanError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| PlanError::UnknownNode(id.to_string()))
    }

    fn is_ready_idx(&self, i: usize) -> bool {
        scoring_service::is_ready_to_execute(&self.nodes[i], self.pending[i].len())
    }

    /// Arena indices in execution order: ready nodes first, then by
    /// priority (1 highest), then complexity, then submission order.
    /// The stable sort keeps submission order as the final tiebreaker.
    fn execution_order_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by(|&a, &b| {
            let ready_a = self.is_ready_idx(a);
            let ready_b = self.is_ready_idx(b);
            ready_b
                .cmp(&ready_a)
                .then(self.nodes[a].priority.cmp(&self.nodes[b].priority))
                .then(
                    scoring_service::complexity_score(&self.nodes[a])
                        .total_cmp(&scoring_service::complexity_score(&self.nodes[b])),
                )
        });
        order
    }

    pub fn execution_order(&self) -> Vec<String> {
        self.execution_order_indices()
            .into_iter()
            .map(|i| self.nodes[i].id.clone())
            .collect()
    }

    /// Ready nodes, path-collision safe: of two ready nodes writing the
    /// same destination only the first in execution order is surfaced,
    /// and a destination held by a running node defers later claimants.
    pub fn ready_set(&self) -> Vec<&OperationNode> {
        let mut claimed: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| n.status == OperationStatus::Running)
            .filter_map(|n| n.destination_path.as_deref())
            .collect();

        let mut out = Vec::new();
        for i in self.execution_order_indices() {
            if !self.is_ready_idx(i) {
                continue;
            }
            if let Some(dest) = self.nodes[i].destination_path.as_deref() {
                if !claimed.insert(dest) {
                    continue;
                }
            }
            out.push(&self.nodes[i]);
        }
        out
    }

    pub fn approve(&mut self, id: &str) -> Result<(), PlanError> {
        let i = self.idx(id)?;
        self.nodes[i].is_approved = true;
        self.nodes[i].is_rejected = false;
        Ok(())
    }

    pub fn approve_all(&mut self) {
        for node in &mut self.nodes {
            if !node.is_rejected {
                node.is_approved = true;
            }
        }
    }

    pub fn reject(&mut self, id: &str) -> Result<(), PlanError> {
        let i = self.idx(id)?;
        self.nodes[i].is_rejected = true;
        self.nodes[i].is_approved = false;
        Ok(())
    }

    pub fn mark_running(&mut self, id: &str) -> Result<(), PlanError> {
        let i = self.idx(id)?;
        if self.nodes[i].status != OperationStatus::Queued {
            return Err(PlanError::InvalidTransition {
                operation_id: id.to_string(),
                status: self.nodes[i].status.to_string(),
                action: "start".to_string(),
            });
        }
        self.nodes[i].status = OperationStatus::Running;
        Ok(())
    }

    pub fn set_progress(&mut self, id: &str, percentage: f64) -> Result<(), PlanError> {
        let i = self.idx(id)?;
        self.nodes[i].progress_percentage = percentage.clamp(0.0, 100.0);
        Ok(())
    }

    /// Marks a node successfully completed, releases it from every
    /// dependent's pending set, and returns the ids that became ready.
    pub fn complete(&mut self, id: &str) -> Result<Vec<String>, PlanError> {
        let i = self.idx(id)?;
        if self.nodes[i].status.is_terminal() {
            return Err(PlanError::InvalidTransition {
                operation_id: id.to_string(),
                status: self.nodes[i].status.to_string(),
                action: "complete".to_string(),
            });
        }
        self.nodes[i].status = OperationStatus::Completed;
        self.nodes[i].progress_percentage = 100.0;

        let mut newly_ready = Vec::new();
        for d in self.dependents[i].clone() {
            self.pending[d].remove(&i);
            if self.is_ready_idx(d) {
                newly_ready.push(self.nodes[d].id.clone());
            }
        }
        debug!(
            session_id = %self.session_id,
            operation_id = %id,
            unblocked = newly_ready.len(),
            "operation completed"
        );
        Ok(newly_ready)
    }

    /// Marks a node failed without recovery and moves every direct and
    /// transitive dependent to blocked. Returns the blocked ids.
    pub fn fail(&mut self, id: &str) -> Result<Vec<String>, PlanError> {
        self.terminate_and_block(id, OperationStatus::Failed, "fail")
    }

    /// Marks a node skipped. A skipped prerequisite never satisfies a
    /// dependency, so dependents are blocked exactly like a failure.
    pub fn skip(&mut self, id: &str) -> Result<Vec<String>, PlanError> {
        self.terminate_and_block(id, OperationStatus::Skipped, "skip")
    }

    fn terminate_and_block(
        &mut self,
        id: &str,
        status: OperationStatus,
        action: &str,
    ) -> Result<Vec<String>, PlanError> {
        let i = self.idx(id)?;
        if self.nodes[i].status.is_terminal() {
            return Err(PlanError::InvalidTransition {
                operation_id: id.to_string(),
                status: self.nodes[i].status.to_string(),
                action: action.to_string(),
            });
        }
        self.nodes[i].status = status;

        let mut blocked = Vec::new();
        let mut queue: VecDeque<usize> = self.dependents[i].iter().copied().collect();
        let mut seen: HashSet<usize> = queue.iter().copied().collect();
        while let Some(d) = queue.pop_front() {
            if !self.nodes[d].status.is_terminal() {
                self.nodes[d].status = OperationStatus::Blocked;
                blocked.push(self.nodes[d].id.clone());
            }
            for &next in &self.dependents[d] {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        if !blocked.is_empty() {
            warn!(
                session_id = %self.session_id,
                operation_id = %id,
                blocked = blocked.len(),
                "dependents blocked after {action}"
            );
        }
        Ok(blocked)
    }

    /// Advisory cancellation: every non-terminal node is marked
    /// cancelled; the executor observes this at its next checkpoint.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0usize;
        for node in &mut self.nodes {
            if !node.status.is_terminal() {
                node.status = OperationStatus::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn count_with_status(&self, status: OperationStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    pub fn is_finished(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_terminal())
    }
}
