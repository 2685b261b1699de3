use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use linkrank_core::persist::{DocMetadata, RawPaths};
use linkrank_server::{build_app, AppState};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn app_for(root: &Path) -> Router {
    build_app(AppState::new(root, root.join("index/index.db")))
}

fn write_corpus(raw_dir: &Path) {
    let raw = RawPaths::new(raw_dir);
    let meta = |url: &str, title: &str| DocMetadata { title: title.into(), url: Some(url.into()), ..Default::default() };
    raw.save_document(
        1,
        r#"<html><body><p>Rust crawlers fetch pages politely.</p><a href="/b">b</a></body></html>"#,
        &meta("http://corpus.test/a", "Crawlers"),
    )
    .unwrap();
    raw.save_document(
        2,
        r#"<html><body><p>Ranking pages with links and rust.</p><a href="/a">a</a></body></html>"#,
        &meta("http://corpus.test/b", "Ranking"),
    )
    .unwrap();
}

#[tokio::test]
async fn health_routes_answer() {
    let dir = tempdir().unwrap();
    let app = app_for(dir.path());
    for uri in ["/", "/health"] {
        let (status, body) = call(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn index_then_search_returns_fused_results() {
    let dir = tempdir().unwrap();
    write_corpus(&dir.path().join("corpus"));
    let app = app_for(dir.path());

    let (status, body) = call(&app, "POST", "/index", Some(json!({ "raw_dir": "corpus" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["indexed_docs"], 2);
    assert_eq!(body["pagerank_docs"], 2);

    let (status, body) = call(&app, "POST", "/search", Some(json!({ "query": "Rust pages" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 5);
    assert_eq!(body["total_results"], 2);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for hit in results {
        assert!(hit["pagerank_norm"].as_f64().unwrap() <= 1.0);
        assert!(hit["snippet"].as_str().unwrap().contains("<b>"));
    }
}

#[tokio::test]
async fn indexing_a_missing_directory_is_a_bad_request() {
    let dir = tempdir().unwrap();
    let app = app_for(dir.path());
    let (status, body) = call(&app, "POST", "/index", Some(json!({ "raw_dir": "does-not-exist" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn searching_an_empty_index_finds_nothing() {
    let dir = tempdir().unwrap();
    let app = app_for(dir.path());
    let (status, body) = call(&app, "POST", "/search", Some(json!({ "query": "anything", "page_size": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 0);
    assert_eq!(body["page_size"], 3);
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn preprocess_reports_each_stage() {
    let dir = tempdir().unwrap();
    let app = app_for(dir.path());
    let (status, body) = call(&app, "POST", "/preprocess", Some(json!({ "raw_text": "The Crawlers are running!" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["normalized_text"], "the crawlers are running");
    assert_eq!(body["token_count"], 4);
    assert_eq!(body["filtered_tokens"], json!(["crawler", "run"]));
    assert_eq!(body["filtered_count"], 2);
}

#[tokio::test]
async fn crawl_requires_seeds() {
    let dir = tempdir().unwrap();
    let app = app_for(dir.path());
    let (status, _) = call(&app, "POST", "/crawl", Some(json!({ "seed_urls": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn crawl_then_index_the_default_raw_directory() {
    let mut site = mockito::Server::new_async().await;
    let _home = site
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><head><title>Seed</title></head><body><p>Seed page about spiders.</p></body></html>")
        .create_async()
        .await;
    let dir = tempdir().unwrap();
    let app = app_for(dir.path());

    let (status, body) = call(&app, "POST", "/crawl", Some(json!({ "seed_urls": [site.url()], "max_pages": 1, "max_depth": 0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_crawled"], 1);
    assert_eq!(body["files"].as_array().unwrap().len(), 1);

    let (status, body) = call(&app, "POST", "/index", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexed_docs"], 1);
}
