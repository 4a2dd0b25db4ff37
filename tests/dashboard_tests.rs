use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use powerflow::agent::Agent;
use powerflow::config::AgentConfig;
use powerflow::dashboard::{router, DashboardState};
use powerflow::scheduler::Task;

fn create_test_app() -> (Arc<Agent>, Router) {
    let agent = Arc::new(Agent::new(AgentConfig::new()));
    let app = router(DashboardState {
        agent: agent.clone(),
    });
    (agent, app)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_status_endpoint() {
    let (agent, app) = create_test_app();
    agent.register_node("A", 100).await.unwrap();
    agent.enqueue_task(Task::new("T1", 10, 100)).await.unwrap();

    let (status, body) = send(app, Method::GET, "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending_tasks"], 1);
    assert_eq!(body["nodes"][0]["id"], "A");
    assert_eq!(body["nodes"][0]["total_capacity"], 100);
    assert_eq!(body["nodes"][0]["available_capacity"], 100);
    assert_eq!(body["nodes"][0]["active"], true);
    assert_eq!(body["nodes"][0]["health"], "healthy");
    assert_eq!(body["stats"]["dropped"], 0);
}

#[tokio::test]
async fn test_register_node_endpoint() {
    let (agent, app) = create_test_app();

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/nodes",
        Some(json!({"id": "A", "capacity": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], "A");
    assert_eq!(agent.get_node("A").await.unwrap().total_capacity(), 100);

    let (status, body) = send(app.clone(), Method::GET, "/api/nodes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/nodes",
        Some(json!({"id": "B", "capacity": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Invalid capacity"));
}

#[tokio::test]
async fn test_unregister_node_endpoint() {
    let (agent, app) = create_test_app();
    agent.register_node("A", 100).await.unwrap();

    let (status, _) = send(app.clone(), Method::DELETE, "/api/nodes/A", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(agent.get_node("A").await.is_err());

    // Unknown ids are a no-op
    let (status, _) = send(app, Method::DELETE, "/api/nodes/A", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_enqueue_task_endpoint() {
    let (agent, app) = create_test_app();

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/tasks",
        Some(json!({"id": "T1", "required_capacity": 60, "execution_time_ms": 1000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "T1");

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/tasks",
        Some(json!({"required_capacity": 5, "execution_time_ms": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["id"].as_str().unwrap().is_empty());

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/tasks",
        Some(json!({"id": "bad", "required_capacity": 0, "execution_time_ms": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert_eq!(agent.pending_tasks().await, 2);

    let (status, body) = send(app, Method::GET, "/api/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], 2);
    assert_eq!(body["task_ids"][0], "T1");
}

#[tokio::test]
async fn test_report_failure_endpoint() {
    let (agent, app) = create_test_app();
    agent.register_node("A", 100).await.unwrap();

    let (status, _) = send(app.clone(), Method::POST, "/api/nodes/A/failure", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent.recovery.failure_count("A").await, 1);

    let (status, body) = send(app, Method::POST, "/api/nodes/ghost/failure", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(agent.recovery.pending_recoveries().await, 1);
}

#[tokio::test]
async fn test_process_recovery_endpoint() {
    let (agent, app) = create_test_app();
    agent.register_node("A", 100).await.unwrap();
    let b = agent.register_node("B", 100).await.unwrap();
    b.set_recoverable(false);
    agent.report_failure("A").await;
    agent.report_failure("B").await;
    assert_eq!(agent.pending_recoveries().await, 2);

    let (status, body) = send(app.clone(), Method::POST, "/api/recovery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 2);
    assert_eq!(body["recovered"], json!(["A"]));
    assert_eq!(body["drained_tasks"], 0);
    assert_eq!(agent.pending_recoveries().await, 0);

    let (status, body) = send(app, Method::POST, "/api/recovery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);
}
