use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::cluster::{NodeRegistry, WorkerNode};
use crate::config::DispatcherConfig;
use crate::error::PowerflowError;
use crate::scheduler::queue::TaskQueue;
use crate::scheduler::task::{Task, TaskState};
use crate::worker::{ExecutionTracker, ReservationFailed};

/// Counters for every dispatch outcome.
#[derive(Debug, Default)]
pub struct DispatchStats {
    assigned: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub assigned: u64,
    pub retried: u64,
    pub dropped: u64,
    pub completed: u64,
}

impl DispatchStats {
    pub fn record_assigned(&self) {
        self.assigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            assigned: self.assigned.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }
}

/// Result of handling a single task.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The queue was empty
    Idle,
    Assigned { task_id: String, node_id: String },
    /// The task failed and went back to the tail of the queue
    Retried {
        task_id: String,
        retry_count: u32,
        reason: PowerflowError,
    },
    /// The task failed with no retries left and is gone for good
    Dropped {
        task_id: String,
        reason: PowerflowError,
    },
}

impl DispatchOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, DispatchOutcome::Idle)
    }
}

/// Pick the tightest fit: the active node with the least available capacity
/// that still covers `required`. Ties go to the lowest node id.
pub fn select_node(nodes: &[Arc<WorkerNode>], required: u32) -> Option<Arc<WorkerNode>> {
    nodes
        .iter()
        .filter(|n| n.is_active() && n.available_capacity() >= required)
        .min_by(|a, b| {
            a.available_capacity()
                .cmp(&b.available_capacity())
                .then_with(|| a.id().cmp(b.id()))
        })
        .cloned()
}

/// Pulls tasks off the queue and places them on nodes.
///
/// Per task: `Pending -> Assigned -> Completed`, or on failure
/// `Failed -> Pending` (re-enqueued at the tail) until the retry budget is
/// spent, then `Failed -> Dropped`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: Arc<RwLock<NodeRegistry>>,
    task_queue: Arc<RwLock<TaskQueue>>,
    tracker: ExecutionTracker,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<RwLock<NodeRegistry>>,
        task_queue: Arc<RwLock<TaskQueue>>,
    ) -> Self {
        let stats = Arc::new(DispatchStats::default());
        Self {
            config,
            registry,
            task_queue,
            tracker: ExecutionTracker::new(stats.clone()),
            stats,
        }
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dequeue one task and dispatch it.
    pub async fn dispatch_next(&self) -> DispatchOutcome {
        let next = self.task_queue.write().await.dequeue();
        match next {
            Some(task) => self.dispatch(task).await,
            None => DispatchOutcome::Idle,
        }
    }

    /// Place `task` on the best-fitting node, or run the retry policy.
    pub async fn dispatch(&self, task: Task) -> DispatchOutcome {
        let nodes = self.registry.read().await.list();

        let Some(node) = select_node(&nodes, task.required_capacity) else {
            tracing::warn!(
                task_id = %task.id,
                required = task.required_capacity,
                "No available node for task"
            );
            let reason = PowerflowError::NoNodeAvailable {
                task_id: task.id.clone(),
                required: task.required_capacity,
            };
            return self.retry(task, reason).await;
        };

        self.dispatch_to(task, &node).await
    }

    /// Place `task` on an already selected `node`. The node's capacity may
    /// have been taken since selection; a lost reservation runs the retry
    /// policy.
    pub async fn dispatch_to(&self, task: Task, node: &Arc<WorkerNode>) -> DispatchOutcome {
        match self.tracker.execute(node, task) {
            Ok(reservation) => {
                self.stats.record_assigned();
                DispatchOutcome::Assigned {
                    task_id: reservation.task_id,
                    node_id: reservation.node_id,
                }
            }
            Err(ReservationFailed {
                task,
                node_id,
                available,
            }) => {
                tracing::warn!(
                    task_id = %task.id,
                    node_id = %node_id,
                    available,
                    required = task.required_capacity,
                    "Lost reservation race"
                );
                let reason = PowerflowError::ReservationLost {
                    task_id: task.id.clone(),
                    node_id,
                };
                self.retry(task, reason).await
            }
        }
    }

    async fn retry(&self, mut task: Task, reason: PowerflowError) -> DispatchOutcome {
        task.state = TaskState::Failed;

        if task.retry_count >= self.config.max_retries {
            task.state = TaskState::Dropped;
            self.stats.record_dropped();
            tracing::error!(
                task_id = %task.id,
                retry_count = task.retry_count,
                last_error = %reason,
                "Task dropped after exhausting retries"
            );
            return DispatchOutcome::Dropped {
                reason: PowerflowError::RetriesExhausted {
                    task_id: task.id.clone(),
                    retries: task.retry_count,
                },
                task_id: task.id,
            };
        }

        task.retry_count += 1;
        task.state = TaskState::Pending;
        let task_id = task.id.clone();
        let retry_count = task.retry_count;
        self.task_queue.write().await.enqueue(task);
        self.stats.record_retried();
        tracing::info!(task_id = %task_id, retry_count, "Task re-enqueued");

        DispatchOutcome::Retried {
            task_id,
            retry_count,
            reason,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Polls the queue; when it is empty the loop idles for the configured
    /// poll interval. Cancellation only stops the loop: executions already
    /// started keep running and release their capacity on schedule.
    pub async fn run(&self, shutdown: CancellationToken) {
        let poll_interval = self.config.poll_interval();
        tracing::info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_retries = self.config.max_retries,
            "Dispatcher started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if self.dispatch_next().await.is_idle() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            } else {
                tokio::task::yield_now().await;
            }
        }

        tracing::info!(in_flight = self.tracker.in_flight(), "Dispatcher stopped");
    }
}
