//! Task envelope types shared by every queue backend.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Delivery priority. Higher priorities are always reserved first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    /// All priorities, highest first.
    pub const ALL: [TaskPriority; 3] = [TaskPriority::High, TaskPriority::Medium, TaskPriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            _ => Err(format!(
                "Invalid priority '{}'. Valid priorities are: high, medium, low",
                s
            )),
        }
    }
}

/// What a worker needs to know to run one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub task_name: String,
    pub tenant_id: String,
    pub entity_id: i64,
}

/// A dispatched task as it travels through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: String,
    pub queue: String,
    pub priority: TaskPriority,
    pub descriptor: JobDescriptor,
    pub enqueued_at: Timestamp,
}

/// A task taken off the queue by a worker and not acknowledged yet.
#[derive(Debug, Clone)]
pub struct ReservedTask {
    pub envelope: TaskEnvelope,
    /// Serialized form as stored by the backend; used to acknowledge.
    pub(crate) raw: String,
}

impl ReservedTask {
    pub fn task_id(&self) -> &str {
        &self.envelope.task_id
    }
}

/// Final result reported to the transport when a task is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Succeeded => "succeeded",
            TaskOutcome::Failed => "failed",
        }
    }
}

/// Per-queue acknowledgement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub succeeded: u64,
    pub failed: u64,
}
