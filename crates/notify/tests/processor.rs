//! `RecorderProcessor` against a local stand-in for the signaling API.

use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use meter_core::config::{NotifyConfig, TrackerConfig};
use meter_core::{RecorderRequest, RequestMeta, WorkerReport};
use meter_notify::{NoCredential, RecorderProcessor, SignalClient, StaticCredential};
use meter_queue::{KeySpace, PoolTracker};
use meter_scheduler::{AssignError, AssignmentHandler, StatusHandler};
use meter_store::{LeaseStore, MemoryStore};
use serde_json::Value;

#[derive(Debug, Clone)]
struct Seen {
    room: Option<String>,
    auth: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct SignalStub {
    status: StatusCode,
    seen: Arc<Mutex<Vec<Seen>>>,
}

async fn hook(
    State(stub): State<SignalStub>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    stub.seen.lock().unwrap().push(Seen {
        room: params.get("room").cloned(),
        auth: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    stub.status
}

/// Serve the stub on an ephemeral port and return its hook URL.
async fn spawn_signal_api(status: StatusCode) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(SignalStub {
            status,
            seen: seen.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), seen)
}

fn meta(url: &str) -> RequestMeta {
    RequestMeta::new(
        RecorderRequest {
            request_id: "r1".into(),
            conference: "room1@conference.example.com".into(),
            room_param: "room1".into(),
            external_api_url: url.into(),
            event_type: "Recording".into(),
            participant: "p@example.com".into(),
        },
        Utc::now(),
    )
}

async fn tracker_with_idle(ids: &[&str]) -> Arc<PoolTracker> {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
    let tracker = Arc::new(PoolTracker::new(
        store,
        KeySpace::default(),
        &TrackerConfig::default(),
    ));
    for id in ids {
        tracker
            .report(&WorkerReport {
                worker_id: id.to_string(),
                busy: false,
                healthy: true,
            })
            .await
            .unwrap();
    }
    tracker
}

fn client(token: Option<&str>) -> SignalClient {
    SignalClient::new(&NotifyConfig {
        signal_api_token: token.map(str::to_string),
        ..NotifyConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn grant_posts_token_and_room() {
    let (url, seen) = spawn_signal_api(StatusCode::OK).await;
    let processor = RecorderProcessor::new(
        tracker_with_idle(&["w1"]).await,
        client(Some("api-secret")),
        Arc::new(StaticCredential::new("recorder-jwt").unwrap()),
    );

    assert!(processor.assign(&meta(&url)).await.unwrap());

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].room.as_deref(), Some("room1"));
    assert_eq!(seen[0].auth.as_deref(), Some("Bearer api-secret"));
    assert_eq!(seen[0].body["token"], "recorder-jwt");
    assert_eq!(seen[0].body["eventType"], "QueueUpdate");
    assert_eq!(seen[0].body["requestId"], "r1");
}

#[tokio::test]
async fn no_recorder_means_no_call() {
    let (url, seen) = spawn_signal_api(StatusCode::OK).await;
    let processor = RecorderProcessor::new(
        tracker_with_idle(&[]).await,
        client(None),
        Arc::new(NoCredential),
    );
    assert!(!processor.assign(&meta(&url)).await.unwrap());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_conference_is_terminal() {
    let (url, _) = spawn_signal_api(StatusCode::NOT_FOUND).await;
    let processor = RecorderProcessor::new(
        tracker_with_idle(&["w1"]).await,
        client(None),
        Arc::new(NoCredential),
    );
    assert!(matches!(
        processor.assign(&meta(&url)).await,
        Err(AssignError::Terminal(_))
    ));
}

#[tokio::test]
async fn server_error_is_retried() {
    let (url, _) = spawn_signal_api(StatusCode::BAD_GATEWAY).await;
    let processor = RecorderProcessor::new(
        tracker_with_idle(&["w1"]).await,
        client(None),
        Arc::new(NoCredential),
    );
    match processor.assign(&meta(&url)).await {
        Err(AssignError::Retry(msg)) => assert!(msg.contains("502")),
        other => panic!("expected Retry, got {other:?}"),
    }
}

#[tokio::test]
async fn update_posts_position_and_wait() {
    let (url, seen) = spawn_signal_api(StatusCode::OK).await;
    let processor = RecorderProcessor::new(
        tracker_with_idle(&[]).await,
        client(None),
        Arc::new(NoCredential),
    );

    assert!(processor.update(&meta(&url), 3, 42).await.unwrap());

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0].body["position"], 3);
    assert_eq!(seen[0].body["time"], 42);
    assert!(seen[0].auth.is_none());
}

#[tokio::test]
async fn failed_update_is_an_error() {
    let (url, _) = spawn_signal_api(StatusCode::INTERNAL_SERVER_ERROR).await;
    let processor = RecorderProcessor::new(
        tracker_with_idle(&[]).await,
        client(None),
        Arc::new(NoCredential),
    );
    assert!(processor.update(&meta(&url), 0, 5).await.is_err());
}
