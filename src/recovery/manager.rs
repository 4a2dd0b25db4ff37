use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::cluster::{NodeHealth, NodeRegistry, FULL_PERFORMANCE};
use crate::recovery::probe::RecoveryProbe;
use crate::scheduler::queue::TaskQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    /// Recovery failed; this many tasks went back to the task queue.
    Drained { tasks: usize },
    NodeNotFound,
}

/// What one pass over the recovery queue did, in processing order.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub outcomes: Vec<(String, RecoveryOutcome)>,
}

impl RecoveryReport {
    pub fn recovered(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == RecoveryOutcome::Recovered)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn drained_tasks(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                RecoveryOutcome::Drained { tasks } => *tasks,
                _ => 0,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[derive(Debug, Default)]
struct RecoveryState {
    pending: VecDeque<String>,
    failure_counts: HashMap<String, u32>,
}

/// Detects failing nodes, tries to restore them, and drains the work of
/// nodes that cannot be restored back into the shared task queue.
///
/// Holds node ids only; node state changes go through the node itself.
pub struct FailureRecoveryManager {
    registry: Arc<RwLock<NodeRegistry>>,
    task_queue: Arc<RwLock<TaskQueue>>,
    probe: Arc<dyn RecoveryProbe>,
    state: Mutex<RecoveryState>,
}

impl FailureRecoveryManager {
    pub fn new(
        registry: Arc<RwLock<NodeRegistry>>,
        task_queue: Arc<RwLock<TaskQueue>>,
        probe: Arc<dyn RecoveryProbe>,
    ) -> Self {
        Self {
            registry,
            task_queue,
            probe,
            state: Mutex::new(RecoveryState::default()),
        }
    }

    /// Queue `node_id` for recovery. Reporting the same node twice queues it
    /// twice; both entries are processed independently.
    pub async fn report_failure(&self, node_id: &str) {
        let count = {
            let mut state = self.state.lock().await;
            state.pending.push_back(node_id.to_string());
            let count = state.failure_counts.entry(node_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(node) = self.registry.read().await.get(node_id) {
            if node.health() == NodeHealth::Healthy {
                node.set_health(NodeHealth::Reported);
            }
        }

        tracing::warn!(node_id, failure_count = count, "Node reported as failed");
    }

    /// Process recovery entries in FIFO order until the queue is empty.
    pub async fn process_recovery_queue(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        loop {
            let next = self.state.lock().await.pending.pop_front();
            let Some(node_id) = next else {
                break;
            };
            let outcome = self.recover(&node_id).await;
            report.outcomes.push((node_id, outcome));
        }

        report
    }

    async fn recover(&self, node_id: &str) -> RecoveryOutcome {
        let Some(node) = self.registry.read().await.get(node_id) else {
            tracing::error!(node_id, "Node not found for recovery");
            return RecoveryOutcome::NodeNotFound;
        };

        node.set_active(false);
        node.set_health(NodeHealth::Recovering);

        if self.probe.attempt(&node) {
            node.set_performance(FULL_PERFORMANCE);
            node.set_health(NodeHealth::Healthy);
            node.set_active(true);
            tracing::info!(node_id, "Node recovered");
            return RecoveryOutcome::Recovered;
        }

        tracing::error!(node_id, "Failed to recover node");
        node.set_health(NodeHealth::Drained);
        let tasks = node.drain();
        let drained = tasks.len();

        if drained > 0 {
            self.task_queue
                .write()
                .await
                .extend(tasks.into_iter().inspect(|task| {
                    tracing::info!(node_id, task_id = %task.id, retry_count = task.retry_count, "Reallocating task");
                }));
        }

        RecoveryOutcome::Drained { tasks: drained }
    }

    /// Report every node performing below its threshold. Returns the ids
    /// reported.
    pub async fn monitor_performance(&self) -> Vec<String> {
        let nodes = self.registry.read().await.list();
        let mut reported = Vec::new();

        for node in nodes {
            if !node.is_performing_optimally() {
                tracing::warn!(
                    node_id = %node.id(),
                    performance = node.performance(),
                    optimal = node.optimal_performance(),
                    "Node underperforming"
                );
                self.report_failure(node.id()).await;
                reported.push(node.id().to_string());
            }
        }

        reported
    }

    /// Historical number of failure reports for `node_id`. Never reset.
    pub async fn failure_count(&self, node_id: &str) -> u32 {
        self.state
            .lock()
            .await
            .failure_counts
            .get(node_id)
            .copied()
            .unwrap_or(0)
    }

    /// Entries waiting in the recovery queue.
    pub async fn pending_recoveries(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Supervisor loop: scan performance and process the recovery queue
    /// every `interval` until `shutdown` is cancelled.
    pub async fn run(&self, interval: std::time::Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(scan_interval_ms = interval.as_millis() as u64, "Recovery supervisor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.monitor_performance().await;
                    let report = self.process_recovery_queue().await;
                    if !report.is_empty() {
                        tracing::debug!(
                            processed = report.outcomes.len(),
                            recovered = report.recovered().len(),
                            drained_tasks = report.drained_tasks(),
                            "Recovery pass finished"
                        );
                    }
                }
            }
        }

        tracing::info!("Recovery supervisor stopped");
    }
}
