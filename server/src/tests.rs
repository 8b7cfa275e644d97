use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::build_app;
use crate::config::AppConfig;
use crate::state::AppState;

fn test_state(dir: &std::path::Path) -> AppState {
    let config = AppConfig {
        bind: "127.0.0.1:0".parse().expect("socket addr must parse"),
        project_name: "NanoIndex".to_string(),
        api_v1_str: "/api/v1".to_string(),
        data_dir: dir.to_path_buf(),
        index_filename: "nano.index".to_string(),
        default_top_k: 10,
        max_dimension: 8,
        strict_finite: true,
        request_timeout_ms: 2_000,
        max_body_bytes: 1_048_576,
        max_concurrency: 256,
        max_topk_limit: 1_000,
        default_n_cells: 4,
    };
    AppState::for_tests(config)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1_048_576).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn live_and_ready_report_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_app(state, "/api/v1");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_add_then_search_returns_nearest_vector() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_app(state, "/api/v1");

    let add_body = json!({
        "vectors": [[0.0, 0.0], [5.0, 5.0], [9.0, 9.0]],
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/index/add")
                .header("content-type", "application/json")
                .body(Body::from(add_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let added = body_json(response).await;
    assert_eq!(added["total_count"], 3);

    let search_body = json!({"vector": [0.1, 0.1], "top_k": 1, "use_index": false});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/search")
                .header("content-type", "application/json")
                .body(Body::from(search_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["results"][0]["id"], 0);
}

#[tokio::test]
async fn search_on_empty_store_returns_empty_results() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_app(state, "/api/v1");

    let search_body = json!({"vector": [0.0, 0.0]});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/search")
                .header("content-type", "application/json")
                .body(Body::from(search_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn train_then_reset_index_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_app(state, "/api/v1");

    let mut vectors = Vec::new();
    for _ in 0..10 {
        vectors.push(vec![0.0, 0.0]);
        vectors.push(vec![9.0, 9.0]);
    }
    let add_body = json!({"vectors": vectors});
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/index/add")
                .header("content-type", "application/json")
                .body(Body::from(add_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/index/train?n_cells=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/index/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn agent_stats_then_reset() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_app(state, "/api/v1");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/agent/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["arms"].as_array().unwrap().len(), 4);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agent/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_add_rejects_empty_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_app(state, "/api/v1");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/index/add")
                .header("content-type", "application/json")
                .body(Body::from(json!({"vectors": []}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
