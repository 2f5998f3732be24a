use serde::Serialize;

/// Plan-construction failures. Any of these aborts construction before a
/// single node becomes ready.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("duplicate operation id: {0}")]
    DuplicateId(String),

    #[error("operation {operation_id} depends on unknown id {missing_id}")]
    DanglingDependency {
        operation_id: String,
        missing_id: String,
    },

    #[error("dependency cycle involving operations: {0:?}")]
    DependencyCycle(Vec<String>),

    #[error("operation {operation_id} has priority {priority}, expected 1..=10")]
    PriorityOutOfRange { operation_id: String, priority: u8 },

    #[error("operation {operation_id} has progress {progress}, expected 0..=100")]
    ProgressOutOfRange { operation_id: String, progress: f64 },

    #[error("unknown operation id: {0}")]
    UnknownNode(String),

    #[error("operation {operation_id} is {status}, cannot {action}")]
    InvalidTransition {
        operation_id: String,
        status: String,
        action: String,
    },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Serialize for PlanError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
