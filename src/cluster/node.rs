use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{PowerflowError, Result};
use crate::scheduler::task::{Task, TaskState};

pub const FULL_PERFORMANCE: u32 = 100;

/// Health of a node as seen by the recovery manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeHealth {
    Healthy,
    Reported,
    Recovering,
    Drained,
}

impl NodeHealth {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => NodeHealth::Reported,
            2 => NodeHealth::Recovering,
            3 => NodeHealth::Drained,
            _ => NodeHealth::Healthy,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            NodeHealth::Healthy => 0,
            NodeHealth::Reported => 1,
            NodeHealth::Recovering => 2,
            NodeHealth::Drained => 3,
        }
    }
}

impl std::fmt::Display for NodeHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeHealth::Healthy => write!(f, "healthy"),
            NodeHealth::Reported => write!(f, "reported"),
            NodeHealth::Recovering => write!(f, "recovering"),
            NodeHealth::Drained => write!(f, "drained"),
        }
    }
}

/// A task held by a node between reservation and release.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub ticket: u64,
    pub task: Task,
}

/// Read-only view of a node for status reporters.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub total_capacity: u32,
    pub available_capacity: u32,
    pub active: bool,
    pub health: NodeHealth,
    pub assigned_tasks: usize,
    pub performance: u32,
}

/// A worker with finite capacity.
///
/// Capacity is a single atomic counter: reservations are a check-and-subtract
/// and releases a check-and-add, both via `fetch_update`, so
/// `0 <= available <= total` holds without locking the node.
#[derive(Debug)]
pub struct WorkerNode {
    id: String,
    total_capacity: u32,
    available: AtomicU32,
    active: AtomicBool,
    health: AtomicU8,
    performance: AtomicU32,
    optimal_performance: u32,
    recoverable: AtomicBool,
    next_ticket: AtomicU64,
    assigned: Mutex<Vec<Assignment>>,
}

impl WorkerNode {
    pub fn new(id: impl Into<String>, total_capacity: u32, optimal_performance: u32) -> Self {
        Self {
            id: id.into(),
            total_capacity,
            available: AtomicU32::new(total_capacity),
            active: AtomicBool::new(true),
            health: AtomicU8::new(NodeHealth::Healthy.as_u8()),
            performance: AtomicU32::new(FULL_PERFORMANCE),
            optimal_performance,
            recoverable: AtomicBool::new(true),
            next_ticket: AtomicU64::new(1),
            assigned: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn total_capacity(&self) -> u32 {
        self.total_capacity
    }

    pub fn available_capacity(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn health(&self) -> NodeHealth {
        NodeHealth::from_u8(self.health.load(Ordering::Acquire))
    }

    pub fn set_health(&self, health: NodeHealth) {
        self.health.store(health.as_u8(), Ordering::Release);
    }

    pub fn performance(&self) -> u32 {
        self.performance.load(Ordering::Acquire)
    }

    /// Update the performance indicator, clamped to `0..=100`.
    pub fn set_performance(&self, performance: u32) {
        self.performance
            .store(performance.min(FULL_PERFORMANCE), Ordering::Release);
    }

    pub fn optimal_performance(&self) -> u32 {
        self.optimal_performance
    }

    pub fn is_performing_optimally(&self) -> bool {
        self.performance() >= self.optimal_performance
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable.load(Ordering::Acquire)
    }

    pub fn set_recoverable(&self, recoverable: bool) {
        self.recoverable.store(recoverable, Ordering::Release);
    }

    /// Atomically subtract `amount` if at least that much is available.
    pub fn try_reserve(&self, amount: u32) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |available| {
                available.checked_sub(amount)
            })
            .is_ok()
    }

    /// Atomically add `amount` back, refusing to exceed total capacity.
    pub fn release(&self, amount: u32) -> Result<()> {
        let total = self.total_capacity;
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |available| {
                available.checked_add(amount).filter(|next| *next <= total)
            })
            .map(|_| ())
            .map_err(|_| PowerflowError::CapacityOverflow {
                node_id: self.id.clone(),
                amount,
            })
    }

    /// Record a task whose capacity has already been reserved.
    pub fn assign(&self, mut task: Task) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        task.state = TaskState::Assigned;
        self.assignments().push(Assignment { ticket, task });
        ticket
    }

    /// Finish an assignment: remove it and release its capacity.
    ///
    /// Returns `None` when the ticket is gone because the node was drained;
    /// the drain already released the capacity.
    pub fn complete(&self, ticket: u64) -> Option<Result<Task>> {
        let mut assigned = self.assignments();
        let pos = assigned.iter().position(|a| a.ticket == ticket)?;
        let Assignment { mut task, .. } = assigned.remove(pos);
        let released = self.release(task.required_capacity);
        drop(assigned);

        task.state = TaskState::Completed;
        Some(released.map(|_| task))
    }

    /// Remove every assignment, release their capacity and return the tasks
    /// in assignment order, ready to be pending again.
    pub fn drain(&self) -> Vec<Task> {
        let drained: Vec<Assignment> = self.assignments().drain(..).collect();
        drained
            .into_iter()
            .map(|Assignment { mut task, .. }| {
                if let Err(e) = self.release(task.required_capacity) {
                    tracing::error!(node_id = %self.id, task_id = %task.id, error = %e, "Capacity accounting broken during drain");
                }
                task.state = TaskState::Pending;
                task
            })
            .collect()
    }

    pub fn assigned_tasks(&self) -> Vec<Task> {
        self.assignments().iter().map(|a| a.task.clone()).collect()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments().len()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id.clone(),
            total_capacity: self.total_capacity,
            available_capacity: self.available_capacity(),
            active: self.is_active(),
            health: self.health(),
            assigned_tasks: self.assigned_count(),
            performance: self.performance(),
        }
    }

    // A panic while holding the list cannot leave it half-updated, so a
    // poisoned lock is still usable.
    fn assignments(&self) -> MutexGuard<'_, Vec<Assignment>> {
        self.assigned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
