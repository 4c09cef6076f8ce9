//! API integration tests.
//!
//! These tests drive the router directly against a running manager.

use mirrorsync::api::{ApiState, build_router};
use mirrorsync::testing::ScriptedExecutor;
use mirrorsync::{
    Exporter, InMemoryCheckpointStore, Job, Manager, ManagerConfig, ManagerHandle,
};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use crate::common::{descriptor, wait_until};

struct TestApi {
    router: Router,
    handle: ManagerHandle,
    task: JoinHandle<()>,
    executor: ScriptedExecutor,
    exporter: Exporter,
}

/// Start a manager with a visible and a hidden job, both reporting to an
/// exporter.
async fn create_test_api() -> TestApi {
    let executor = ScriptedExecutor::succeeding().with_output("synced", "");
    let exporter = Exporter::new().unwrap();

    let alpha = Job::new(
        descriptor("alpha", 3600),
        Arc::new(executor.clone()),
        Arc::new(exporter.clone()),
    )
    .unwrap();
    let secret = Job::new(
        descriptor("secret", 3600).with("hidden", true),
        Arc::new(executor.clone()),
        Arc::new(exporter.clone()),
    )
    .unwrap();

    let manager = Manager::with_jobs(
        ManagerConfig::new(Duration::from_millis(20), 2),
        vec![alpha, secret],
        Arc::new(InMemoryCheckpointStore::new()),
    )
    .await
    .unwrap();
    let (handle, task) = manager.start().await;

    let router = build_router(ApiState::new(handle.clone(), exporter.clone()));
    TestApi {
        router,
        handle,
        task,
        executor,
        exporter,
    }
}

async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Test: Health endpoint responds with status ok.
#[tokio::test]
async fn test_health_endpoint() {
    let api = create_test_api().await;

    let (status, json) = send(&api.router, Method::GET, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

/// Test: Manager status lists visible workers with their output.
#[tokio::test]
async fn test_manager_status_hides_hidden_jobs() {
    let api = create_test_api().await;
    let executor = api.executor.clone();
    wait_until("both initial syncs", Duration::from_secs(5), || {
        executor.call_count() >= 2
    })
    .await;
    assert_eq!(api.handle.job_names(), vec!["alpha", "secret"]);

    let (status, json) = send(&api.router, Method::GET, "/api/v1/manager").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], true);
    let workers = json["workers"].as_object().unwrap();
    assert_eq!(workers.len(), 1);
    assert!(workers.contains_key("alpha"));
    assert!(workers["alpha"]["stdout"].is_array());
    assert!(workers["alpha"]["last_finished"].is_string());
}

/// Test: Summary omits captured output.
#[tokio::test]
async fn test_manager_summary_endpoint() {
    let api = create_test_api().await;

    let (status, json) = send(&api.router, Method::GET, "/api/v1/manager/summary").await;

    assert_eq!(status, StatusCode::OK);
    let alpha = &json["workers"]["alpha"];
    assert!(alpha["idle"].is_boolean());
    assert!(alpha["result"].is_boolean());
    assert!(alpha.get("stdout").is_none());
}

/// Test: Stop and start toggle the running flag.
#[tokio::test]
async fn test_stop_and_start() {
    let api = create_test_api().await;

    let (status, json) = send(&api.router, Method::POST, "/api/v1/manager/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "manager stopped");

    let (_, json) = send(&api.router, Method::GET, "/api/v1/manager/summary").await;
    assert_eq!(json["running"], false);

    let (status, _) = send(&api.router, Method::POST, "/api/v1/manager/start").await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&api.router, Method::GET, "/api/v1/manager/summary").await;
    assert_eq!(json["running"], true);
}

/// Test: Triggering a job runs it again.
#[tokio::test]
async fn test_trigger_job() {
    let api = create_test_api().await;
    let executor = api.executor.clone();
    wait_until("both initial syncs", Duration::from_secs(5), || {
        executor.call_count() >= 2
    })
    .await;

    let (status, json) = send(&api.router, Method::POST, "/api/v1/jobs/alpha/trigger").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["job"], "alpha");
    wait_until("the triggered sync", Duration::from_secs(5), || {
        executor.call_count() >= 3
    })
    .await;
}

/// Test: Triggering an unknown job returns 404.
#[tokio::test]
async fn test_trigger_unknown_job() {
    let api = create_test_api().await;

    let (status, json) = send(&api.router, Method::POST, "/api/v1/jobs/nope/trigger").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

/// Test: Metrics endpoint exposes per-worker counters.
#[tokio::test]
async fn test_metrics_endpoint() {
    let api = create_test_api().await;
    let exporter = api.exporter.clone();
    wait_until("alpha to sync", Duration::from_secs(5), || {
        exporter.success_count("alpha") >= 1
    })
    .await;

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = api.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE success_sync counter"));
    assert!(text.contains("success_sync{worker=\"alpha\"}"));
}

/// Test: Deleting the manager ends its loop; later control calls fail.
#[tokio::test]
async fn test_exit_manager() {
    let api = create_test_api().await;

    let (status, json) = send(&api.router, Method::DELETE, "/api/v1/manager").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "manager exited");

    tokio::time::timeout(Duration::from_secs(5), api.task)
        .await
        .expect("manager loop did not end")
        .unwrap();

    let (status, json) = send(&api.router, Method::POST, "/api/v1/manager/start").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
}

/// Test: Unknown routes return 404.
#[tokio::test]
async fn test_unknown_route() {
    let api = create_test_api().await;

    let (status, _) = send(&api.router, Method::GET, "/api/v1/nothing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
