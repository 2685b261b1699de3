//! HTTP surface over the crawl, index and search pipeline.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use linkrank_core::tokenizer::{analyze, filter_tokens, normalize_text, tokenize};
use linkrank_core::{run_pagerank, search, IndexStore, PageRankConfig, RankerConfig, SearchParams, SearchResponse};
use linkrank_crawler::{crawl, CrawlConfig};
use linkrank_indexer::{index_documents, IndexError, IndexStats};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    /// Relative paths in requests resolve against this directory.
    pub data_root: PathBuf,
    pub db_path: PathBuf,
    pub crawl: CrawlConfig,
    pub pagerank: PageRankConfig,
    pub ranker: RankerConfig,
}

impl AppState {
    pub fn new(data_root: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            db_path: db_path.into(),
            crawl: CrawlConfig::default(),
            pagerank: PageRankConfig::default(),
            ranker: RankerConfig::default(),
        }
    }

    /// Where crawled pages land and the default source for indexing.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_root.join("raw")
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() { p.to_path_buf() } else { self.data_root.join(p) }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::warn!(error = %e, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
}

fn default_max_pages() -> usize { 50 }
fn default_max_depth() -> usize { 1 }
fn default_topk() -> usize { 10 }
fn default_page() -> usize { 1 }
fn default_page_size() -> usize { 5 }

#[derive(Deserialize)]
pub struct CrawlRequest {
    pub seed_urls: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Serialize)]
pub struct CrawlResponse {
    pub total_crawled: usize,
    pub files: Vec<String>,
}

#[derive(Deserialize, Default)]
pub struct IndexRequest {
    /// Defaults to the crawler's raw directory.
    #[serde(default)]
    pub raw_dir: Option<String>,
}

#[derive(Serialize)]
pub struct IndexResponse {
    #[serde(flatten)]
    pub stats: IndexStats,
    pub pagerank_docs: usize,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_topk")]
    pub topk: usize,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Deserialize)]
pub struct PreprocessRequest {
    pub raw_text: String,
}

#[derive(Serialize)]
pub struct PreprocessResponse {
    pub normalized_text: String,
    pub tokens: Vec<String>,
    pub filtered_tokens: Vec<String>,
    pub token_count: usize,
    pub filtered_count: usize,
}

fn cors_layer() -> CorsLayer {
    // CORS_ALLOW_ORIGIN is comma-separated; unset or unparsable allows any origin
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/crawl", post(crawl_handler))
        .route("/index", post(index_handler))
        .route("/search", post(search_handler))
        .route("/preprocess", post(preprocess_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn crawl_handler(State(state): State<AppState>, Json(req): Json<CrawlRequest>) -> Result<Json<CrawlResponse>, ApiError> {
    if req.seed_urls.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "seed_urls must not be empty"));
    }
    let files = crawl(&req.seed_urls, req.max_pages, req.max_depth, &state.raw_dir(), &state.crawl)
        .await
        .map_err(internal)?;
    let files: Vec<String> = files.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    Ok(Json(CrawlResponse { total_crawled: files.len(), files }))
}

/// Rebuild the index, then refresh PageRank. A PageRank failure is logged
/// and reported as zero scored documents.
pub async fn index_handler(State(state): State<AppState>, body: Option<Json<IndexRequest>>) -> Result<Json<IndexResponse>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let raw_dir = match &req.raw_dir {
        Some(dir) => state.resolve(dir),
        None => state.raw_dir(),
    };

    let result = tokio::task::spawn_blocking(move || -> Result<IndexResponse, IndexError> {
        let mut store = IndexStore::open(&state.db_path)?;
        let stats = index_documents(&mut store, &raw_dir)?;
        let scores = run_pagerank(&mut store, &state.pagerank);
        Ok(IndexResponse { stats, pagerank_docs: scores.len() })
    })
    .await
    .map_err(internal)?;

    match result {
        Ok(resp) => Ok(Json(resp)),
        Err(e @ IndexError::MissingSource(_)) => Err(api_error(StatusCode::BAD_REQUEST, e)),
        Err(e) => Err(internal(e)),
    }
}

pub async fn search_handler(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let query_terms = analyze(&req.query);
    let params = SearchParams { topk: req.topk, page: req.page, page_size: req.page_size };

    let resp = tokio::task::spawn_blocking(move || -> anyhow::Result<SearchResponse> {
        let store = IndexStore::open(&state.db_path)?;
        search(&store, &query_terms, &params, &state.ranker)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;
    Ok(Json(resp))
}

pub async fn preprocess_handler(Json(req): Json<PreprocessRequest>) -> Json<PreprocessResponse> {
    let normalized_text = normalize_text(&req.raw_text);
    let tokens = tokenize(&normalized_text);
    let filtered_tokens = filter_tokens(&tokens);
    Json(PreprocessResponse {
        token_count: tokens.len(),
        filtered_count: filtered_tokens.len(),
        normalized_text,
        tokens,
        filtered_tokens,
    })
}
