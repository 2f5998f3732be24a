use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource pressure gauges, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceGauges {
    pub cpu: f64,
    pub memory: f64,
    pub disk_io: f64,
}

impl ResourceGauges {
    pub fn new(cpu: f64, memory: f64, disk_io: f64) -> Self {
        Self {
            cpu: cpu.clamp(0.0, 1.0),
            memory: memory.clamp(0.0, 1.0),
            disk_io: disk_io.clamp(0.0, 1.0),
        }
    }

    pub fn any_above(&self, threshold: f64) -> bool {
        self.cpu > threshold || self.memory > threshold || self.disk_io > threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    /// Seconds.
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Running,
    Error,
    Done,
}

/// Live per-plan aggregate snapshot handed to the UI/telemetry layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub session_id: String,
    pub total_operations: usize,
    pub completed_operations: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub percentage: f64,
    pub operations_per_second: f64,
    pub bytes_per_second: f64,
    pub gauges: ResourceGauges,
    pub is_optimized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_stages: Vec<StageRecord>,
    pub error_count: usize,
    pub warning_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_errors: Vec<String>,
    pub status: AggregateStatus,
    pub operation_health_score: f64,
    pub needs_attention: bool,
    pub status_description: String,
    pub performance_summary: String,
    pub generated_at: DateTime<Utc>,
}
