use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cluster::{NodeRegistry, NodeSnapshot, WorkerNode};
use crate::config::AgentConfig;
use crate::error::{PowerflowError, Result};
use crate::recovery::{FailureRecoveryManager, RecoverabilityFlag, RecoveryProbe, RecoveryReport};
use crate::scheduler::{Dispatcher, Task, TaskQueue};
use crate::status::ClusterSnapshot;

struct Running {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owns every component and the state they share.
///
/// External callers register nodes and enqueue tasks here; `start` spawns
/// the dispatcher loop and, when enabled, the recovery supervisor.
pub struct Agent {
    pub config: AgentConfig,
    pub registry: Arc<RwLock<NodeRegistry>>,
    pub task_queue: Arc<RwLock<TaskQueue>>,
    pub dispatcher: Dispatcher,
    pub recovery: Arc<FailureRecoveryManager>,
    running: Mutex<Option<Running>>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self::with_probe(config, Arc::new(RecoverabilityFlag))
    }

    pub fn with_probe(config: AgentConfig, probe: Arc<dyn RecoveryProbe>) -> Self {
        let registry = Arc::new(RwLock::new(NodeRegistry::with_performance_threshold(
            config.recovery.optimal_performance,
        )));
        let task_queue = Arc::new(RwLock::new(TaskQueue::new()));
        let dispatcher = Dispatcher::new(
            config.dispatcher.clone(),
            registry.clone(),
            task_queue.clone(),
        );
        let recovery = Arc::new(FailureRecoveryManager::new(
            registry.clone(),
            task_queue.clone(),
            probe,
        ));

        Self {
            config,
            registry,
            task_queue,
            dispatcher,
            recovery,
            running: Mutex::new(None),
        }
    }

    pub async fn register_node(&self, id: &str, capacity: u32) -> Result<Arc<WorkerNode>> {
        self.registry.write().await.register(id, capacity)
    }

    pub async fn unregister_node(&self, id: &str) {
        self.registry.write().await.unregister(id);
    }

    pub async fn get_node(&self, id: &str) -> Result<Arc<WorkerNode>> {
        self.registry
            .read()
            .await
            .get(id)
            .ok_or_else(|| PowerflowError::NodeNotFound(id.to_string()))
    }

    /// Add a task to the tail of the queue.
    pub async fn enqueue_task(&self, task: Task) -> Result<()> {
        if task.required_capacity == 0 {
            return Err(PowerflowError::InvalidTask { task_id: task.id });
        }
        tracing::info!(task_id = %task.id, required = task.required_capacity, "Task enqueued");
        self.task_queue.write().await.enqueue(task);
        Ok(())
    }

    pub async fn report_failure(&self, node_id: &str) {
        self.recovery.report_failure(node_id).await;
    }

    /// Process every queued failure report now. With the supervisor
    /// disabled this is the only thing that consumes reports.
    pub async fn process_recovery_queue(&self) -> RecoveryReport {
        let report = self.recovery.process_recovery_queue().await;
        if !report.is_empty() {
            tracing::info!(
                processed = report.outcomes.len(),
                recovered = report.recovered().len(),
                drained_tasks = report.drained_tasks(),
                "Recovery queue processed"
            );
        }
        report
    }

    pub async fn pending_recoveries(&self) -> usize {
        self.recovery.pending_recoveries().await
    }

    pub async fn pending_tasks(&self) -> usize {
        self.task_queue.read().await.len()
    }

    pub async fn nodes(&self) -> Vec<NodeSnapshot> {
        self.registry
            .read()
            .await
            .list()
            .iter()
            .map(|n| n.snapshot())
            .collect()
    }

    pub async fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self.nodes().await,
            pending_tasks: self.pending_tasks().await,
            stats: self.dispatcher.stats(),
            taken_at: Utc::now(),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Spawn the dispatcher loop and, if enabled, the recovery supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`PowerflowError::AlreadyRunning`] if the agent was already
    /// started and not stopped since.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(PowerflowError::AlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        let mut handles = Vec::new();

        let dispatcher = self.dispatcher.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            dispatcher.run(token).await;
        }));

        if self.config.recovery.enabled {
            let recovery = self.recovery.clone();
            let interval = self.config.recovery.scan_interval();
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                recovery.run(interval, token).await;
            }));
        }

        *running = Some(Running { shutdown, handles });
        tracing::info!("Agent started");
        Ok(())
    }

    /// Stop the loops and wait for them to exit. Executions already in flight
    /// are left to finish; see [`Agent::wait_for_in_flight`].
    pub async fn stop(&self) {
        let Some(Running { shutdown, handles }) = self.running.lock().await.take() else {
            return;
        };

        shutdown.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Agent loop terminated abnormally");
            }
        }
        tracing::info!(
            in_flight = self.dispatcher.tracker().in_flight(),
            "Agent stopped"
        );
    }

    /// Wait until every started execution has released its capacity.
    pub async fn wait_for_in_flight(&self) {
        self.dispatcher.tracker().wait_idle().await;
    }
}
