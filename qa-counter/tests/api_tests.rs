//! Integration tests for the qa-counter HTTP API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use http_body_util::BodyExt;
use qa_common::config::CounterConfig;
use qa_counter::search_client::{KeywordCounter, RetryPolicy, SearchClient, SearchError};
use qa_counter::worker::{spawn_worker, WorkerConfig};
use qa_counter::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

struct FixedCounter;

#[async_trait]
impl KeywordCounter for FixedCounter {
    async fn count(&self, _shop_id: &str, _environment: &str, keyword: Option<&str>) -> Result<i64, SearchError> {
        Ok(match keyword.map(str::trim) {
            Some("") | None => 0,
            Some(k) => k.split_whitespace().count() as i64,
        })
    }
}

fn create_test_app() -> Router {
    let (state, receiver) = AppState::new();
    spawn_worker(
        receiver,
        state.jobs.clone(),
        Arc::new(FixedCounter),
        WorkerConfig {
            max_concurrency: 4,
            default_environment: "prod".to_string(),
        },
    );
    build_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
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

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "qa-counter");
}

#[tokio::test]
async fn test_start_job_rejects_missing_keywords() {
    let app = create_test_app();

    let (status, body) = send(&app, post_json("/start_job", r#"{"shop_id": "1"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid request"}));

    let (status, _) = send(&app, post_json("/start_job", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_is_not_found_status() {
    let app = create_test_app();
    let (status, body) = send(&app, get("/get_results/nope")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "not_found"}));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_test_app();
    let (status, body) = send(&app, get("/jobs")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_job_lifecycle() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        post_json(
            "/start_job",
            r#"{"shop_id": "12", "keywords": ["red shoes", "", "blue suede shoes"]}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let mut last = Value::Null;
    for _ in 0..100 {
        let (_, body) = send(&app, get(&format!("/get_results/{}", job_id))).await;
        last = body;
        if last["status"] == "complete" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last, json!({"status": "complete", "results": [2, 0, 3]}));
}

/// Fake search backend: "shoes" matches two products, "slow" reports a timeout,
/// "sparse" only matches without trimmed fields, everything else matches nothing
async fn spawn_search_backend(calls: Arc<AtomicUsize>) -> String {
    let app = Router::new().route(
        "/:env/search",
        post(move |Json(body): Json<Value>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let trimmed = body.get("include_fields").is_some();
                let response = match body["query"].as_str().unwrap_or_default() {
                    "shoes" => json!({"products": [{"product_id": "a"}, {"product_id": "b"}]}),
                    "slow" => json!({"products": [], "timed_out_services": ["catalog"]}),
                    "sparse" if !trimmed => json!({"products": [{"product_id": "c"}]}),
                    _ => json!({"products": []}),
                };
                Json(response)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/{{env}}/search", addr)
}

#[tokio::test]
async fn test_search_client_against_backend() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = CounterConfig::default();
    config.search_url_template = spawn_search_backend(calls.clone()).await;
    let client = SearchClient::new(&config).unwrap().with_retry_policy(RetryPolicy {
        max_attempts: 2,
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    });

    assert_eq!(client.count("1", "prod", Some(" shoes ")).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(client.count("1", "prod", Some("sparse")).await.unwrap(), 1);
    assert_eq!(client.count("1", "prod", Some("nothing")).await.unwrap(), 0);

    let before = calls.load(Ordering::SeqCst);
    assert!(matches!(
        client.count("1", "prod", Some("slow")).await,
        Err(SearchError::Timeout(_))
    ));
    assert_eq!(calls.load(Ordering::SeqCst) - before, 2);
}
