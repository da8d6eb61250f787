use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vecspace_core::corpus::{ingest_corpus, load_corpus, upsert_input_doc, InputDoc};
use vecspace_core::{DocId, DocumentVector, IndexConfig, SharedIndex, VectorIndex, VectorMatch};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct SimilarParams {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}
fn default_threshold() -> f64 { 0.8 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<VectorMatch>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub upserted: usize,
    pub num_docs: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub index: SharedIndex,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

pub fn build_app(corpus: Option<String>, config: IndexConfig) -> Result<Router> {
    let mut index = VectorIndex::with_config(config);
    if let Some(path) = corpus {
        let docs = load_corpus(&path)?;
        ingest_corpus(&mut index, &docs);
    }
    tracing::info!(num_docs = index.len(), "index loaded");
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState { index: index.into_shared(), admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/similar", get(similar_handler))
        .route("/doc/:doc_id", get(doc_handler).delete(delete_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let mut results = state.index.read().search(&params.q, None);
    let total_hits = results.len();
    results.truncate(params.k.clamp(1, 100));
    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn similar_handler(
    State(state): State<AppState>,
    Query(params): Query<SimilarParams>,
) -> Json<BTreeMap<DocId, Vec<VectorMatch>>> {
    Json(state.index.read().find_similar_documents(params.threshold))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<DocumentVector>, ApiError> {
    state
        .index
        .read()
        .get_document_vector(doc_id)
        .map(Json)
        .ok_or_else(|| not_found(doc_id))
}

// --- Admin endpoints ---

/// Upserts documents without touching weights; follow with a commit.
async fn index_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(docs): Json<Vec<InputDoc>>,
) -> Result<Json<BatchResponse>, ApiError> {
    authorize(&state, &headers)?;
    for doc in &docs {
        doc.validate().map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    }
    let mut index = state.index.write();
    for doc in &docs {
        upsert_input_doc(&mut *index, doc);
    }
    tracing::info!(upserted = docs.len(), num_docs = index.len(), "batch ingested");
    Ok(Json(BatchResponse { upserted: docs.len(), num_docs: index.len() }))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let mut index = state.index.write();
    index.recompute_all_weights();
    Ok(Json(serde_json::json!({ "num_docs": index.len() })))
}

async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<DocId>,
) -> Result<Json<DocumentVector>, ApiError> {
    authorize(&state, &headers)?;
    state.index.write().remove_document(doc_id).map(Json).ok_or_else(|| not_found(doc_id))
}

fn not_found(doc_id: DocId) -> ApiError { (StatusCode::NOT_FOUND, format!("document {doc_id} not found")) }

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
