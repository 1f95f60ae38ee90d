use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use meter_core::config::{QueueConfig, TrackerConfig};
use meter_queue::{KeySpace, PoolTracker, RequestQueue};
use meter_scheduler::LoopMetrics;
use meter_server::{build_router, AppState};
use meter_store::{LeaseStore, MemoryStore};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: Arc<dyn LeaseStore>,
    keys: KeySpace,
    queue: Arc<RequestQueue>,
}

fn create_test_app() -> TestApp {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
    let keys = KeySpace::new("test");
    let tracker = Arc::new(PoolTracker::new(
        store.clone(),
        keys.clone(),
        &TrackerConfig::default(),
    ));
    let queue = Arc::new(RequestQueue::new(
        store.clone(),
        keys.clone(),
        &QueueConfig::default(),
    ));
    let state = Arc::new(AppState {
        queue: queue.clone(),
        tracker,
        metrics: Arc::new(LoopMetrics::new()),
        backend: "memory".to_string(),
    });
    TestApp {
        app: build_router(state),
        store,
        keys,
        queue,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

fn status_event(id: &str, busy: &str, health: &str) -> Value {
    json!({
        "jibriId": id,
        "status": { "busyStatus": busy, "health": { "healthStatus": health } }
    })
}

#[tokio::test]
async fn test_health_reports_backend() {
    let t = create_test_app();
    let response = t.app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_enqueue_returns_accepted_with_metadata() {
    let t = create_test_app();
    let request = post_json(
        "/job/recording",
        json!({ "requestId": "r1", "conference": "room@muc", "participant": "alice" }),
    );
    let response = t.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["requestId"], "r1");
    assert_eq!(json["participant"], "alice");
    assert!(json["created"].is_string());
    assert_eq!(t.queue.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_enqueue_rejects_blank_request_id() {
    let t = create_test_app();
    let response = t
        .app
        .oneshot(post_json("/job/recording", json!({ "requestId": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_cancel_removes_request() {
    let t = create_test_app();
    t.app
        .clone()
        .oneshot(post_json("/job/recording", json!({ "requestId": "r1" })))
        .await
        .unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri("/job/recording/r1")
        .body(Body::empty())
        .unwrap();
    let response = t.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(t.queue.is_empty().await.unwrap());
    assert!(t.queue.get("r1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_unknown_request_is_no_content() {
    let t = create_test_app();
    let request = Request::builder()
        .method("DELETE")
        .uri("/job/recording/nope")
        .body(Body::empty())
        .unwrap();
    let response = t.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_idle_recorder_status_marks_available() {
    let t = create_test_app();
    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/recorder/status",
            status_event("w1", "IDLE", "HEALTHY"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["idle"], true);

    let json = body_json(t.app.oneshot(get("/queue")).await.unwrap()).await;
    assert_eq!(json["idle_recorders"], json!(["w1"]));
}

#[tokio::test]
async fn test_busy_recorder_status_clears_availability() {
    let t = create_test_app();
    t.app
        .clone()
        .oneshot(post_json(
            "/recorder/status",
            status_event("w1", "IDLE", "HEALTHY"),
        ))
        .await
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/recorder/status",
            status_event("w1", "BUSY", "HEALTHY"),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["idle"], false);

    let json = body_json(t.app.oneshot(get("/queue")).await.unwrap()).await;
    assert_eq!(json["idle_recorders"], json!([]));
}

#[tokio::test]
async fn test_malformed_recorder_status_names_missing_field() {
    let t = create_test_app();
    let response = t
        .app
        .oneshot(post_json(
            "/recorder/status",
            json!({ "jibriId": "w1", "status": { "busyStatus": "IDLE" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_text(response).await,
        "missing field: status.health.healthStatus"
    );
}

#[tokio::test]
async fn test_queue_status_lists_orphans() {
    let t = create_test_app();
    for id in ["r1", "r2"] {
        t.app
            .clone()
            .oneshot(post_json("/job/recording", json!({ "requestId": id })))
            .await
            .unwrap();
    }
    t.store.delete(&t.keys.request("r1")).await.unwrap();

    let response = t.app.oneshot(get("/queue")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["length"], 2);
    assert_eq!(json["orphans"], json!(["r1"]));
    // Both are inside the update grace period.
    assert_eq!(json["positions"], json!([]));
}

#[tokio::test]
async fn test_metrics_start_at_zero() {
    let t = create_test_app();
    let response = t.app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ticks"], 0);
    assert_eq!(json["assigned"], 0);
    assert!(json["captured_at"].is_string());
}
