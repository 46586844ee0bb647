//! Wire contract tests against an in-process peer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use hemonet_state::{ErrorAction, ErrorLog, MemoryErrorLog};
use peer_client::{ClientError, Label, RemoteClient, RemoteConfig};
use serde_json::{json, Value};

async fn spawn_peer(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str, log: Arc<MemoryErrorLog>) -> RemoteClient {
    RemoteClient::new(RemoteConfig::new("node-a", base_url), log).unwrap()
}

#[tokio::test]
async fn test_single_observation_uses_classify_endpoint_with_token() {
    let seen_auth: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_auth);
    let router = Router::new().route(
        "/api/v1/classify",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let seen = Arc::clone(&seen);
            async move {
                *seen.lock().unwrap() = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                assert_eq!(body["wbc"], 5.0);
                Json(json!({"result": "POSITIVE", "prob": 0.83}))
            }
        }),
    );
    let base = spawn_peer(router).await;
    let log = Arc::new(MemoryErrorLog::new());
    let client = RemoteClient::new(
        RemoteConfig::new("node-a", &base).with_token("s3cret"),
        log.clone(),
    )
    .unwrap();

    let prediction = client.classify(&[json!({"wbc": 5.0})]).await.unwrap();
    assert_eq!(prediction.get(0), Some((Label::Positive, 0.83)));
    assert_eq!(seen_auth.lock().unwrap().as_deref(), Some("Token s3cret"));
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_batch_uses_dataset_endpoint_and_keeps_order() {
    let router = Router::new().route(
        "/api/v1/classify_dataset",
        post(|Json(body): Json<Value>| async move {
            let rows = body["dataset"].as_array().unwrap().clone();
            let result: Vec<&str> = rows
                .iter()
                .map(|r| if r["wbc"].as_f64().unwrap() > 10.0 { "POSITIVE" } else { "NEGATIVE" })
                .collect();
            let prob: Vec<f64> = rows.iter().map(|_| 0.75).collect();
            Json(json!({"result": result, "prob": prob}))
        }),
    );
    let base = spawn_peer(router).await;
    let client = client(&base, Arc::new(MemoryErrorLog::new()));

    let rows = vec![json!({"wbc": 12.0}), json!({"wbc": 4.0}), json!({"wbc": 15.0})];
    let prediction = client.classify(&rows).await.unwrap();
    assert_eq!(
        prediction.labels,
        vec![Label::Positive, Label::Negative, Label::Positive]
    );
}

#[tokio::test]
async fn test_http_500_is_unavailable_and_logged_with_status() {
    let router = Router::new().route(
        "/api/v1/classify",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = spawn_peer(router).await;
    let log = Arc::new(MemoryErrorLog::new());
    let client = client(&base, log.clone());

    let err = client.classify(&[json!({"wbc": 5.0})]).await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    let entries = log.entries_for("node-a");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status_code, Some(500));
    assert_eq!(entries[0].action, ErrorAction::Classify);
}

#[tokio::test]
async fn test_slow_peer_times_out_as_unavailable() {
    let router = Router::new().route(
        "/api/v1/classify",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"result": "POSITIVE", "prob": 0.9}))
        }),
    );
    let base = spawn_peer(router).await;
    let log = Arc::new(MemoryErrorLog::new());
    let client = RemoteClient::new(
        RemoteConfig::new("node-a", &base).with_timeout_secs(1),
        log.clone(),
    )
    .unwrap();

    let started = Instant::now();
    let err = client.classify(&[json!({"wbc": 5.0})]).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "returned after {elapsed:?}");
    match err {
        ClientError::Unavailable { status, message, .. } => {
            assert_eq!(status, None);
            assert_eq!(message, "timed out after 1s");
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, ErrorAction::Classify);
    assert_eq!(entries[0].status_code, None);
    assert_eq!(entries[0].message, "timed out after 1s");
}

#[tokio::test]
async fn test_size_mismatch_is_protocol_violation() {
    let router = Router::new().route(
        "/api/v1/classify_dataset",
        post(|| async { Json(json!({"result": ["POSITIVE"], "prob": [0.9]})) }),
    );
    let base = spawn_peer(router).await;
    let log = Arc::new(MemoryErrorLog::new());
    let client = client(&base, log.clone());

    let err = client
        .classify(&[json!({"wbc": 1.0}), json!({"wbc": 2.0})])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ProtocolViolation { .. }));
    assert_eq!(log.entries().len(), 1);
}

#[tokio::test]
async fn test_unknown_label_is_protocol_violation() {
    let router = Router::new().route(
        "/api/v1/classify",
        post(|| async { Json(json!({"result": "MAYBE", "prob": 0.5})) }),
    );
    let base = spawn_peer(router).await;
    let client = client(&base, Arc::new(MemoryErrorLog::new()));

    let err = client.classify(&[json!({})]).await.unwrap_err();
    assert!(matches!(err, ClientError::ProtocolViolation { .. }));
}

#[tokio::test]
async fn test_metadata_and_share() {
    let router = Router::new()
        .route(
            "/api/v1/classify_dataset",
            get(|| async { Json(json!({"classifier": "hgb-tree", "accuracy": 0.91})) }),
        )
        .route(
            "/api/v1/data",
            axum::routing::put(|Json(body): Json<Value>| async move {
                if body.get("uuid").is_some() {
                    StatusCode::CREATED
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        );
    let base = spawn_peer(router).await;
    let log = Arc::new(MemoryErrorLog::new());
    let client = client(&base, log.clone());

    let metadata = client.fetch_metadata().await.unwrap();
    assert_eq!(metadata["classifier"], "hgb-tree");

    assert!(client.share_data(&json!({"uuid": "abc", "wbc": 5.0})).await);
    assert!(!client.share_data(&json!({"wbc": 5.0})).await);

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, ErrorAction::ShareData);
    assert_eq!(entries[0].status_code, Some(400));
}
