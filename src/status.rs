use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cluster::NodeSnapshot;
use crate::scheduler::DispatchStatsSnapshot;

/// Read-only view of the agent for status reporters.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub pending_tasks: usize,
    pub stats: DispatchStatsSnapshot,
    pub taken_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    pub fn active_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.active).count()
    }

    pub fn total_capacity(&self) -> u64 {
        self.nodes.iter().map(|n| u64::from(n.total_capacity)).sum()
    }

    pub fn available_capacity(&self) -> u64 {
        self.nodes.iter().map(|n| u64::from(n.available_capacity)).sum()
    }

    /// One-line, counts-only summary suitable for posting as a status update.
    pub fn status_line(&self) -> String {
        format!(
            "Powerflow status: {} active nodes, {} tasks pending",
            self.active_nodes(),
            self.pending_tasks
        )
    }
}
