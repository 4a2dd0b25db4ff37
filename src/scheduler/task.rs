use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Assigned,
    Completed,
    Failed,
    Dropped,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Assigned => write!(f, "assigned"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::Dropped => write!(f, "dropped"),
        }
    }
}

/// A unit of work requiring a capacity quantum for a fixed, simulated
/// execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub required_capacity: u32,
    pub execution_time_ms: u64,
    pub retry_count: u32,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, required_capacity: u32, execution_time_ms: u64) -> Self {
        Self {
            id: id.into(),
            required_capacity,
            execution_time_ms,
            retry_count: 0,
            state: TaskState::Pending,
            created_at: Utc::now(),
        }
    }

    /// Create a task with a generated UUID id.
    pub fn generated(required_capacity: u32, execution_time_ms: u64) -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            required_capacity,
            execution_time_ms,
        )
    }

    pub fn execution_time(&self) -> Duration {
        Duration::from_millis(self.execution_time_ms)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (capacity={}, time={}ms, retries={})",
            self.id, self.required_capacity, self.execution_time_ms, self.retry_count
        )
    }
}
