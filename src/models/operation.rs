use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::confidence::ConfidenceMetrics;
use crate::models::risk::RiskAssessment;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Move,
    Copy,
    Delete,
    Rename,
    CreateFolder,
    Compress,
    Decompress,
    Merge,
    Split,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Move => write!(f, "move"),
            Self::Copy => write!(f, "copy"),
            Self::Delete => write!(f, "delete"),
            Self::Rename => write!(f, "rename"),
            Self::CreateFolder => write!(f, "create_folder"),
            Self::Compress => write!(f, "compress"),
            Self::Decompress => write!(f, "decompress"),
            Self::Merge => write!(f, "merge"),
            Self::Split => write!(f, "split"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(Self::Move),
            "copy" => Ok(Self::Copy),
            "delete" => Ok(Self::Delete),
            "rename" => Ok(Self::Rename),
            "create_folder" => Ok(Self::CreateFolder),
            "compress" => Ok(Self::Compress),
            "decompress" => Ok(Self::Decompress),
            "merge" => Ok(Self::Merge),
            "split" => Ok(Self::Split),
            _ => Err(format!("unknown operation type: {s}")),
        }
    }
}

/// Node lifecycle. `Queued` is the only state a node can be handed to an
/// executor from; everything except `Queued` and `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Blocked,
    Skipped,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Blocked => write!(f, "blocked"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub primary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

/// Inverse-operation data captured before execution so a completed node
/// can be rolled back, in the shape an undo log keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub instructions: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A single proposed file action plus its scoring, dependency, and
/// status metadata. Construction goes through [`OperationNode::new`] and
/// the `with_*` helpers; once submitted to a plan, only the plan mutates
/// status, progress, and approval flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationNode {
    pub id: String,
    pub op_type: OperationType,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_folder_name: Option<String>,
    pub confidence: ConfidenceMetrics,
    pub risk: RiskAssessment,
    #[serde(default)]
    pub reasoning: Reasoning,
    /// Declared prerequisites. Never mutated after construction; the
    /// plan tracks still-pending prerequisites separately.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enables: Vec<String>,
    pub priority: u8,
    pub status: OperationStatus,
    pub progress_percentage: f64,
    pub is_approved: bool,
    pub is_rejected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_size_bytes: Option<u64>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl OperationNode {
    pub fn new(op_type: OperationType, source_path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op_type,
            source_path: source_path.into(),
            destination_path: None,
            new_folder_name: None,
            confidence: ConfidenceMetrics::default(),
            risk: RiskAssessment::low(),
            reasoning: Reasoning::default(),
            depends_on: Vec::new(),
            enables: Vec::new(),
            priority: DEFAULT_PRIORITY,
            status: OperationStatus::Queued,
            progress_percentage: 0.0,
            is_approved: false,
            is_rejected: false,
            rollback: None,
            estimated_size_bytes: None,
            estimated_duration: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_destination(mut self, path: impl Into<String>) -> Self {
        self.destination_path = Some(path.into());
        self
    }

    pub fn with_new_folder_name(mut self, name: impl Into<String>) -> Self {
        self.new_folder_name = Some(name.into());
        self
    }

    pub fn with_confidence(mut self, confidence: ConfidenceMetrics) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_risk(mut self, risk: RiskAssessment) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_reasoning(mut self, reasoning: Reasoning) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_dependencies(mut self, ids: Vec<String>) -> Self {
        self.depends_on = ids;
        self
    }

    pub fn with_enables(mut self, ids: Vec<String>) -> Self {
        self.enables = ids;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_approval(mut self, approved: bool) -> Self {
        self.is_approved = approved;
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackPlan) -> Self {
        self.rollback = Some(rollback);
        self
    }

    pub fn with_estimated_size_bytes(mut self, bytes: u64) -> Self {
        self.estimated_size_bytes = Some(bytes);
        self
    }

    pub fn with_estimated_duration(mut self, seconds: u64) -> Self {
        self.estimated_duration = Some(seconds);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn estimated_size_mb(&self) -> f64 {
        self.estimated_size_bytes.unwrap_or(0) as f64 / (1024.0 * 1024.0)
    }

    /// Base name of the source path, for user-facing messages.
    pub fn source_file_name(&self) -> &str {
        self.source_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.source_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_round_trip() {
        for op in [
            OperationType::Move,
            OperationType::Copy,
            OperationType::Delete,
            OperationType::Rename,
            OperationType::CreateFolder,
            OperationType::Compress,
            OperationType::Decompress,
            OperationType::Merge,
            OperationType::Split,
        ] {
            let parsed: OperationType = op.to_string().parse().unwrap();
            assert_eq!(parsed, op);
        }
        assert!("shred".parse::<OperationType>().is_err());
    }

    #[test]
    fn test_node_json_round_trip_with_optionals() {
        let node = OperationNode::new(OperationType::Move, "/downloads/report.pdf")
            .with_destination("/documents/report.pdf")
            .with_priority(3)
            .with_dependencies(vec!["dep-1".to_string()])
            .with_estimated_size_bytes(1024)
            .with_rollback(RollbackPlan {
                instructions: "move back to /downloads".to_string(),
                data: serde_json::json!({ "original": "/downloads/report.pdf" }),
            });

        let json = serde_json::to_string(&node).unwrap();
        let decoded: OperationNode = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_node_json_round_trip_with_nones() {
        let node = OperationNode::new(OperationType::Delete, "/tmp/scratch.log");
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("destination_path"));
        let decoded: OperationNode = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_enums_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&OperationStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert_eq!(
            serde_json::to_string(&OperationType::CreateFolder).unwrap(),
            "\"create_folder\""
        );
    }

    #[test]
    fn test_source_file_name() {
        let node = OperationNode::new(OperationType::Move, "/downloads/report.pdf");
        assert_eq!(node.source_file_name(), "report.pdf");
        let bare = OperationNode::new(OperationType::Move, "report.pdf");
        assert_eq!(bare.source_file_name(), "report.pdf");
    }
}
