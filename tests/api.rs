//! HTTP contract tests against the in-process router.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use cerevyn_rag::config::Config;
use cerevyn_rag::embedding::HashProvider;
use cerevyn_rag::rag::RagService;
use cerevyn_rag::server::{create_app, AppState};
use cerevyn_rag::store::InMemoryStore;

const BOUNDARY: &str = "cerevyn-test-boundary";

fn test_app(upload_dir: &Path) -> Router {
    let mut config = Config::default();
    config.store.backend = "memory".to_string();
    config.embedding.provider = "hash".to_string();
    config.server.upload_dir = upload_dir.to_path_buf();

    let rag = RagService::new(
        Arc::new(HashProvider::new(256)),
        Arc::new(InMemoryStore::new()),
    );
    create_app(AppState::new(Arc::new(rag), &config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::post("/add_file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn add_text(app: &Router, text: &str) {
    let (status, body) = send(app, post_json("/add_text", json!({ "text": text }))).await;
    assert_eq!(status, StatusCode::OK, "add_text failed: {}", body);
}

#[tokio::test]
async fn health_reports_healthy() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["message"], "RAG server is running");
    assert_eq!(body["documents"], 0);
}

#[tokio::test]
async fn add_text_returns_success_and_id() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(
        &app,
        post_json("/add_text", json!({ "text": "hello", "metadata": { "source": "test" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Text added successfully");
    assert!(body["id"].as_str().unwrap().starts_with("doc_"));
}

#[tokio::test]
async fn add_text_without_text_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    for payload in [json!({}), json!({ "text": "" }), json!({ "text": null })] {
        let (status, body) = send(&app, post_json("/add_text", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No text provided");
    }

    let (_, health) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(health["documents"], 0);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let request = Request::post("/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn nested_metadata_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(
        &app,
        post_json("/add_text", json!({ "text": "x", "metadata": { "tags": ["a", "b"] } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("tags"));
}

#[tokio::test]
async fn search_and_context_require_query() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    for uri in ["/search", "/get_context"] {
        let (status, body) = send(&app, post_json(uri, json!({ "n_results": 2 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No query provided");
    }
}

#[tokio::test]
async fn search_ranks_closest_first_and_defaults_to_three() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    add_text(&app, "Rust ownership and borrowing rules").await;
    add_text(&app, "Sourdough bread hydration ratio").await;
    add_text(&app, "Kubernetes rollout strategy").await;
    add_text(&app, "Espresso grind size").await;

    let (status, body) = send(&app, post_json("/search", json!({ "query": "rust borrowing" }))).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["text"], "Rust ownership and borrowing rules");
    assert!(results[0]["metadata"]["timestamp"].is_string());

    let scores: Vec<f64> = results.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn search_on_empty_store_is_empty() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(&app, post_json("/search", json!({ "query": "anything" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));

    let (status, body) = send(&app, post_json("/get_context", json!({ "query": "anything" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["context"], "");
}

#[tokio::test]
async fn get_context_joins_with_blank_line() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    add_text(&app, "alpha beta").await;
    add_text(&app, "alpha gamma").await;

    let (status, body) = send(
        &app,
        post_json("/get_context", json!({ "query": "alpha", "n_results": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let context = body["context"].as_str().unwrap();
    let mut parts: Vec<&str> = context.split("\n\n").collect();
    parts.sort();
    assert_eq!(parts, vec!["alpha beta", "alpha gamma"]);

    let (_, body) = send(
        &app,
        post_json("/get_context", json!({ "query": "alpha gamma", "n_results": 1 })),
    )
    .await;
    assert_eq!(body["context"], "alpha gamma");
}

#[tokio::test]
async fn get_context_defaults_to_three_ranked_documents() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    add_text(&app, "delta epsilon").await;
    add_text(&app, "alpha").await;
    add_text(&app, "alpha beta gamma").await;
    add_text(&app, "alpha beta").await;

    let (status, body) = send(
        &app,
        post_json("/get_context", json!({ "query": "alpha beta gamma" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let parts: Vec<&str> = body["context"].as_str().unwrap().split("\n\n").collect();
    assert_eq!(parts, vec!["alpha beta gamma", "alpha beta", "alpha"]);
}

#[tokio::test]
async fn invalid_n_results_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, _) = send(
        &app,
        post_json("/search", json!({ "query": "x", "n_results": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_file_ingests_and_removes_temp_file() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(
        &app,
        multipart_request("file", "notes.txt", b"zebra migration patterns"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "add_file failed: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "File added successfully");

    let leftovers = std::fs::read_dir(tmp.path()).unwrap().count();
    assert_eq!(leftovers, 0, "temporary upload was not removed");

    let (_, body) = send(&app, post_json("/search", json!({ "query": "zebra migration", "n_results": 1 }))).await;
    let hit = &body["results"][0];
    assert_eq!(hit["text"], "zebra migration patterns");
    assert_eq!(hit["metadata"]["file_type"], ".txt");
    assert!(hit["metadata"]["file_path"].as_str().unwrap().contains("temp_"));
    assert!(hit["metadata"]["timestamp"].is_string());
}

#[tokio::test]
async fn add_file_unsupported_type_stores_placeholder() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, _) = send(&app, multipart_request("file", "blob.xyz", b"\x00\x01\x02")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, post_json("/get_context", json!({ "query": "unsupported", "n_results": 1 }))).await;
    assert_eq!(body["context"], "Unsupported file type: .xyz");
}

#[tokio::test]
async fn add_file_extraction_failure_is_server_error_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(&app, multipart_request("file", "broken.pdf", b"not a valid pdf")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

    let (_, health) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(health["documents"], 0);
}

#[tokio::test]
async fn add_file_without_file_field_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(&app, multipart_request("attachment", "notes.txt", b"hi")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (status, body) = send(&app, post_json("/add_file", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn add_file_with_empty_name_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let (status, body) = send(&app, multipart_request("file", "", b"hi")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file selected");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(tmp.path());

    let request = Request::get("/health")
        .header(header::ORIGIN, "http://chat.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
