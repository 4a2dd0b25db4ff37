use std::collections::HashMap;
use std::sync::Arc;

use crate::cluster::node::WorkerNode;
use crate::error::{PowerflowError, Result};

const DEFAULT_OPTIMAL_PERFORMANCE: u32 = 80;

/// Owns the set of worker nodes.
///
/// Nodes are handed out as `Arc<WorkerNode>`, so callers can mutate a node's
/// capacity after the registry lock is released.
#[derive(Debug)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<WorkerNode>>,
    optimal_performance: u32,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::with_performance_threshold(DEFAULT_OPTIMAL_PERFORMANCE)
    }

    pub fn with_performance_threshold(optimal_performance: u32) -> Self {
        Self {
            nodes: HashMap::new(),
            optimal_performance,
        }
    }

    /// Register a node with all of its capacity available.
    ///
    /// Replaces any node already registered under `id`.
    pub fn register(&mut self, id: &str, total_capacity: u32) -> Result<Arc<WorkerNode>> {
        if total_capacity == 0 {
            return Err(PowerflowError::InvalidCapacity {
                node_id: id.to_string(),
                capacity: total_capacity,
            });
        }

        let node = Arc::new(WorkerNode::new(
            id,
            total_capacity,
            self.optimal_performance,
        ));
        if self.nodes.insert(id.to_string(), node.clone()).is_some() {
            tracing::warn!(node_id = id, total_capacity, "Node re-registered, previous state replaced");
        } else {
            tracing::info!(node_id = id, total_capacity, "Node registered");
        }
        Ok(node)
    }

    /// Remove a node. Removing an unknown id is a no-op.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<WorkerNode>> {
        let removed = self.nodes.remove(id);
        if removed.is_some() {
            tracing::info!(node_id = id, "Node unregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkerNode>> {
        self.nodes.get(id).cloned()
    }

    /// Snapshot of all nodes sorted by id.
    pub fn list(&self) -> Vec<Arc<WorkerNode>> {
        let mut nodes: Vec<Arc<WorkerNode>> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn optimal_performance(&self) -> u32 {
        self.optimal_performance
    }
}
