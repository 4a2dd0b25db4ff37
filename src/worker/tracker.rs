use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

use crate::cluster::WorkerNode;
use crate::scheduler::dispatcher::DispatchStats;
use crate::scheduler::task::Task;

/// A successful reservation: the task is now running on `node_id`.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub task_id: String,
    pub node_id: String,
    pub ticket: u64,
}

/// A reservation that lost the capacity race. The task is handed back.
#[derive(Debug)]
pub struct ReservationFailed {
    pub task: Task,
    pub node_id: String,
    pub available: u32,
}

/// Reserves capacity for tasks and schedules the matching releases.
///
/// Every release runs on a [`TaskTracker`], so shutting the dispatcher down
/// never aborts them and [`ExecutionTracker::wait_idle`] can await them.
#[derive(Debug, Clone)]
pub struct ExecutionTracker {
    in_flight: TaskTracker,
    /// Held across close/wait/reopen so concurrent waiters cannot reopen
    /// the tracker under each other.
    idle_waiters: Arc<Mutex<()>>,
    stats: Arc<DispatchStats>,
}

impl ExecutionTracker {
    pub fn new(stats: Arc<DispatchStats>) -> Self {
        Self {
            in_flight: TaskTracker::new(),
            idle_waiters: Arc::new(Mutex::new(())),
            stats,
        }
    }

    /// Reserve `task.required_capacity` on `node` and start the simulated
    /// execution. Must be called from within a Tokio runtime.
    pub fn execute(
        &self,
        node: &Arc<WorkerNode>,
        task: Task,
    ) -> Result<Reservation, ReservationFailed> {
        let reservation = self.reserve(node, task)?;
        tracing::info!(
            task_id = %reservation.task_id,
            node_id = %reservation.node_id,
            available = node.available_capacity(),
            "Task assigned"
        );
        Ok(reservation)
    }

    fn reserve(
        &self,
        node: &Arc<WorkerNode>,
        task: Task,
    ) -> Result<Reservation, ReservationFailed> {
        if !node.try_reserve(task.required_capacity) {
            return Err(ReservationFailed {
                node_id: node.id().to_string(),
                available: node.available_capacity(),
                task,
            });
        }

        let task_id = task.id.clone();
        let duration = task.execution_time();
        let ticket = node.assign(task);
        self.schedule_release(node.clone(), ticket, duration);

        Ok(Reservation {
            task_id,
            node_id: node.id().to_string(),
            ticket,
        })
    }

    fn schedule_release(&self, node: Arc<WorkerNode>, ticket: u64, duration: std::time::Duration) {
        let stats = self.stats.clone();
        self.in_flight.spawn(async move {
            tokio::time::sleep(duration).await;
            Self::release(&node, ticket, &stats);
        });
    }

    /// Return an assignment's capacity to its node.
    fn release(node: &WorkerNode, ticket: u64, stats: &DispatchStats) {
        match node.complete(ticket) {
            Some(Ok(task)) => {
                stats.record_completed();
                tracing::info!(
                    task_id = %task.id,
                    node_id = %node.id(),
                    available = node.available_capacity(),
                    "Task completed"
                );
            }
            Some(Err(e)) => {
                tracing::error!(node_id = %node.id(), ticket, error = %e, "Capacity release failed");
            }
            None => {
                tracing::warn!(
                    node_id = %node.id(),
                    ticket,
                    "Completion for an assignment that was already drained"
                );
            }
        }
    }

    /// Number of executions whose release has not run yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait until every scheduled release has run. Safe to call from
    /// several tasks at once; waiters are served one at a time.
    pub async fn wait_idle(&self) {
        let _guard = self.idle_waiters.lock().await;
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }
}
