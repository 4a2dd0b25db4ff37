use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::Agent;
use crate::scheduler::Task;

#[derive(Clone)]
pub struct DashboardState {
    pub agent: Arc<Agent>,
}

#[derive(Deserialize)]
struct RegisterNodeRequest {
    id: String,
    capacity: u32,
}

#[derive(Deserialize)]
struct EnqueueTaskRequest {
    id: Option<String>,
    required_capacity: u32,
    execution_time_ms: u64,
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

impl ActionResponse {
    fn ok(id: String) -> Json<Self> {
        Json(Self {
            success: true,
            id: Some(id),
            error: None,
        })
    }

    fn failed(error: String) -> Json<Self> {
        Json(Self {
            success: false,
            id: None,
            error: Some(error),
        })
    }
}

#[derive(Serialize)]
struct RecoveryResponse {
    processed: usize,
    recovered: Vec<String>,
    drained_tasks: usize,
}

#[derive(Serialize)]
struct QueueResponse {
    pending: usize,
    task_ids: Vec<String>,
}

pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/nodes", get(list_nodes_handler).post(register_node_handler))
        .route("/api/nodes/:id", delete(unregister_node_handler))
        .route("/api/nodes/:id/failure", post(report_failure_handler))
        .route("/api/recovery", post(process_recovery_handler))
        .route("/api/queue", get(queue_handler))
        .route("/api/tasks", post(enqueue_task_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the dashboard until `shutdown` is cancelled.
pub async fn run_dashboard(addr: SocketAddr, state: DashboardState, shutdown: CancellationToken) {
    tracing::info!(addr = %addr, "Starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind dashboard server");
            return;
        }
    };

    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "Dashboard server failed");
    }
}

async fn status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.agent.snapshot().await)
}

async fn list_nodes_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.agent.nodes().await)
}

async fn queue_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let queue = state.agent.task_queue.read().await;
    Json(QueueResponse {
        pending: queue.len(),
        task_ids: queue.pending_ids(),
    })
}

async fn register_node_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<RegisterNodeRequest>,
) -> impl IntoResponse {
    match state.agent.register_node(&payload.id, payload.capacity).await {
        Ok(node) => (StatusCode::OK, ActionResponse::ok(node.id().to_string())),
        Err(e) => (StatusCode::BAD_REQUEST, ActionResponse::failed(e.to_string())),
    }
}

async fn unregister_node_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.agent.unregister_node(&id).await;
    (StatusCode::OK, ActionResponse::ok(id))
}

async fn report_failure_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.agent.get_node(&id).await.is_err() {
        return (
            StatusCode::NOT_FOUND,
            ActionResponse::failed(format!("Node not found: {}", id)),
        );
    }
    state.agent.report_failure(&id).await;
    (StatusCode::OK, ActionResponse::ok(id))
}

async fn process_recovery_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let report = state.agent.process_recovery_queue().await;
    Json(RecoveryResponse {
        processed: report.outcomes.len(),
        recovered: report.recovered().into_iter().map(String::from).collect(),
        drained_tasks: report.drained_tasks(),
    })
}

async fn enqueue_task_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<EnqueueTaskRequest>,
) -> impl IntoResponse {
    let task = match payload.id {
        Some(id) => Task::new(id, payload.required_capacity, payload.execution_time_ms),
        None => Task::generated(payload.required_capacity, payload.execution_time_ms),
    };
    let task_id = task.id.clone();

    match state.agent.enqueue_task(task).await {
        Ok(()) => (StatusCode::OK, ActionResponse::ok(task_id)),
        Err(e) => (StatusCode::BAD_REQUEST, ActionResponse::failed(e.to_string())),
    }
}
