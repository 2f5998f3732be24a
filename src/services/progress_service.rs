use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::failure::ErrorSeverity;
use crate::models::progress::{AggregateStatus, ProgressUpdate, ResourceGauges, StageRecord};

pub const RECENT_ERRORS_CAP: usize = 10;
const ERROR_PENALTY_WEIGHT: f64 = 0.3;
const RESOURCE_PENALTY: f64 = 0.2;
const RESOURCE_PENALTY_THRESHOLD: f64 = 0.9;
const OPTIMIZATION_BONUS: f64 = 0.1;
const ATTENTION_GAUGE_THRESHOLD: f64 = 0.95;

/// Consumes per-node outcome and gauge reports from the executor and
/// keeps cumulative counters plus instantaneous rates. Counter updates
/// are commutative, so interleaved reports from concurrently running
/// nodes aggregate the same regardless of arrival order.
pub struct ProgressAggregator {
    session_id: String,
    total_operations: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    error_count: usize,
    warning_count: usize,
    bytes_processed: u64,
    busy_seconds: u64,
    recent_errors: VecDeque<String>,
    gauges: ResourceGauges,
    is_optimized: bool,
    current_stage: Option<String>,
    stage_started_at: Option<DateTime<Utc>>,
    completed_stages: Vec<StageRecord>,
    started_at: DateTime<Utc>,
}

impl ProgressAggregator {
    pub fn new(
        session_id: impl Into<String>,
        total_operations: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            total_operations,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            error_count: 0,
            warning_count: 0,
            bytes_processed: 0,
            busy_seconds: 0,
            recent_errors: VecDeque::new(),
            gauges: ResourceGauges::default(),
            is_optimized: false,
            current_stage: None,
            stage_started_at: None,
            completed_stages: Vec::new(),
            started_at,
        }
    }

    pub fn record_success(&mut self, bytes_processed: u64, duration_secs: u64) {
        self.succeeded += 1;
        self.bytes_processed += bytes_processed;
        self.busy_seconds += duration_secs;
    }

    pub fn record_failure(&mut self, severity: ErrorSeverity, message: impl Into<String>) {
        self.failed += 1;
        if severity >= ErrorSeverity::Error {
            self.error_count += 1;
        } else {
            self.warning_count += 1;
        }
        if self.recent_errors.len() == RECENT_ERRORS_CAP {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message.into());
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn set_gauges(&mut self, gauges: ResourceGauges) {
        self.gauges = gauges;
    }

    pub fn set_optimized(&mut self, optimized: bool) {
        self.is_optimized = optimized;
    }

    /// Opens a new stage, closing the previous one and recording its
    /// duration in the stage history.
    pub fn begin_stage(&mut self, name: impl Into<String>, now: DateTime<Utc>) {
        let name = name.into();
        self.close_current_stage(now);
        debug!(session_id = %self.session_id, stage = %name, "stage started");
        self.current_stage = Some(name);
        self.stage_started_at = Some(now);
    }

    pub fn finish_stages(&mut self, now: DateTime<Utc>) {
        self.close_current_stage(now);
    }

    fn close_current_stage(&mut self, now: DateTime<Utc>) {
        if let (Some(name), Some(started)) = (self.current_stage.take(), self.stage_started_at.take())
        {
            let duration = (now - started).num_seconds().max(0) as u64;
            self.completed_stages.push(StageRecord { name, duration });
        }
    }

    pub fn completed_operations(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    fn status(&self) -> AggregateStatus {
        if self.error_count > 0 {
            AggregateStatus::Error
        } else if self.completed_operations() >= self.total_operations {
            AggregateStatus::Done
        } else {
            AggregateStatus::Running
        }
    }

    /// `clamp(success_rate - error_penalty - resource_penalty +
    /// optimization_bonus, 0, 1)`.
    pub fn operation_health_score(&self) -> f64 {
        let completed = self.completed_operations();
        let success_rate = if completed == 0 {
            1.0
        } else {
            self.succeeded as f64 / completed as f64
        };
        let error_penalty =
            (self.error_count as f64 / (completed as f64 + 1.0)) * ERROR_PENALTY_WEIGHT;
        let resource_penalty = if self.gauges.any_above(RESOURCE_PENALTY_THRESHOLD) {
            RESOURCE_PENALTY
        } else {
            0.0
        };
        let optimization_bonus = if self.is_optimized {
            OPTIMIZATION_BONUS
        } else {
            0.0
        };
        (success_rate - error_penalty - resource_penalty + optimization_bonus).clamp(0.0, 1.0)
    }

    pub fn needs_attention(&self) -> bool {
        self.error_count > 0
            || self.gauges.any_above(ATTENTION_GAUGE_THRESHOLD)
            || !self.is_optimized
            || self.status() == AggregateStatus::Error
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ProgressUpdate {
        let completed = self.completed_operations();
        let percentage = if self.total_operations == 0 {
            100.0
        } else {
            (completed as f64 / self.total_operations as f64 * 100.0).clamp(0.0, 100.0)
        };
        let elapsed_secs = (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let (operations_per_second, bytes_per_second) = if elapsed_secs > 0.0 {
            (
                completed as f64 / elapsed_secs,
                self.bytes_processed as f64 / elapsed_secs,
            )
        } else {
            (0.0, 0.0)
        };

        let status = self.status();
        let status_description = match status {
            AggregateStatus::Running => format!(
                "{completed} of {} operations finished",
                self.total_operations
            ),
            AggregateStatus::Error => format!(
                "{} of {} operations finished, {} error(s)",
                completed, self.total_operations, self.error_count
            ),
            AggregateStatus::Done => {
                format!("all {} operations finished", self.total_operations)
            }
        };
        let avg_op_secs = if self.succeeded > 0 {
            self.busy_seconds as f64 / self.succeeded as f64
        } else {
            0.0
        };
        let performance_summary = format!(
            "{:.1} ops/s, {:.0} KB/s, {:.1} s/op, health {:.2}",
            operations_per_second,
            bytes_per_second / 1024.0,
            avg_op_secs,
            self.operation_health_score()
        );

        ProgressUpdate {
            session_id: self.session_id.clone(),
            total_operations: self.total_operations,
            completed_operations: completed,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            percentage,
            operations_per_second,
            bytes_per_second,
            gauges: self.gauges,
            is_optimized: self.is_optimized,
            current_stage: self.current_stage.clone(),
            completed_stages: self.completed_stages.clone(),
            error_count: self.error_count,
            warning_count: self.warning_count,
            recent_errors: self.recent_errors.iter().cloned().collect(),
            status,
            operation_health_score: self.operation_health_score(),
            needs_attention: self.needs_attention(),
            status_description,
            performance_summary,
            generated_at: now,
        }
    }
}
