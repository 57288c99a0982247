// 🌐 HTTP API - Search and summary endpoints over the enriched dataset

use crate::enrichment::EnrichedRecord;
use crate::query::{DatasetHandle, FilterOptions, SearchQuery};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    dataset: Arc<Mutex<DatasetHandle>>,
}

impl AppState {
    pub fn new(dataset: DatasetHandle) -> Self {
        AppState {
            dataset: Arc::new(Mutex::new(dataset)),
        }
    }

    fn dataset(&self) -> MutexGuard<'_, DatasetHandle> {
        // A panicked handler leaves the dataset itself intact
        self.dataset
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub report: Option<String>,
    pub records: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub records: usize,
}

#[derive(Debug, Deserialize)]
pub struct AskParams {
    #[serde(default)]
    pub q: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /search_company?q=&state=&status= - Bare array of matching rows
async fn search_company(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let dataset = state.dataset();

    if !dataset.is_loaded() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Dataset not loaded" })),
        )
            .into_response();
    }

    let result: Vec<EnrichedRecord> = dataset.search(&query).into_iter().cloned().collect();
    (StatusCode::OK, Json(result)).into_response()
}

/// GET /api/companies - Same filters, wrapped
async fn get_companies(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let dataset = state.dataset();
    let result: Vec<EnrichedRecord> = dataset.search(&query).into_iter().cloned().collect();
    Json(ApiResponse::ok(result))
}

/// GET /api/filters - Distinct states and statuses
async fn get_filters(State(state): State<AppState>) -> Json<ApiResponse<FilterOptions>> {
    Json(ApiResponse::ok(state.dataset().filter_options()))
}

/// GET /api/summary - Daily summary report text
async fn get_summary(State(state): State<AppState>) -> Json<ApiResponse<SummaryResponse>> {
    let dataset = state.dataset();
    Json(ApiResponse::ok(SummaryResponse {
        report: dataset.summary().map(String::from),
        records: dataset.records().len(),
        loaded_at: dataset.loaded_at(),
    }))
}

/// GET /api/ask?q= - Rule-based question answering
async fn ask(
    State(state): State<AppState>,
    Query(params): Query<AskParams>,
) -> Json<ApiResponse<String>> {
    Json(ApiResponse::ok(state.dataset().answer(&params.q)))
}

/// POST /api/reload - Re-read the dataset from disk
async fn reload(State(state): State<AppState>) -> Response {
    let mut dataset = state.dataset();

    match dataset.reload() {
        Ok(records) => {
            info!(records, "dataset reloaded");
            (StatusCode::OK, Json(ApiResponse::ok(ReloadResponse { records }))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<ReloadResponse>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/companies", get(get_companies))
        .route("/filters", get(get_filters))
        .route("/summary", get(get_summary))
        .route("/ask", get(ask))
        .route("/reload", post(reload));

    Router::new()
        .route("/search_company", get(search_company))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::write_enriched;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::path::Path;
    use tower::ServiceExt;

    fn record(cin: &str, name: &str, state: &str, status: &str) -> EnrichedRecord {
        EnrichedRecord {
            cin: cin.to_string(),
            company_name: name.to_string(),
            state: state.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    fn loaded_state(dir: &Path) -> AppState {
        let enriched = dir.join("enriched.csv");
        write_enriched(
            &enriched,
            &[
                record("U1001", "Acme Widgets", "goa", "Active"),
                record("U1002", "Bharat Steel", "kerala", "Strike Off"),
            ],
        )
        .unwrap();
        std::fs::write(dir.join("summary.txt"), "Total changes      : 2\n").unwrap();

        AppState::new(DatasetHandle::open(enriched, dir.join("summary.txt")))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(loaded_state(dir.path())), "GET", "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_search_company_filters() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(loaded_state(dir.path()));

        let (status, body) = call(app, "GET", "/search_company?q=acme&status=Active").await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["CIN"], "U1001");
    }

    #[tokio::test]
    async fn test_search_company_without_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(DatasetHandle::open(
            dir.path().join("missing.csv"),
            dir.path().join("summary.txt"),
        ));

        let (status, body) = call(router(state), "GET", "/search_company?q=x").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Dataset not loaded");
    }

    #[tokio::test]
    async fn test_filters_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let state = loaded_state(dir.path());

        let (_, filters) = call(router(state.clone()), "GET", "/api/filters").await;
        assert_eq!(filters["data"]["states"], serde_json::json!(["goa", "kerala"]));

        let (_, summary) = call(router(state), "GET", "/api/summary").await;
        assert_eq!(summary["data"]["records"], 2);
        assert!(summary["data"]["report"].as_str().unwrap().contains("Total changes"));
    }

    #[tokio::test]
    async fn test_ask() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(loaded_state(dir.path()));

        let (_, body) = call(app, "GET", "/api/ask?q=strike%20off").await;

        assert_eq!(body["data"], "Total struck-off companies: 1");
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(DatasetHandle::new(
            dir.path().join("enriched.csv"),
            dir.path().join("summary.txt"),
        ));

        let (status, body) = call(router(state.clone()), "POST", "/api/reload").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        write_enriched(
            &dir.path().join("enriched.csv"),
            &[record("U1", "One", "goa", "Active")],
        )
        .unwrap();

        let (status, body) = call(router(state.clone()), "POST", "/api/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["records"], 1);

        let (_, companies) = call(router(state), "GET", "/api/companies").await;
        assert_eq!(companies["data"].as_array().unwrap().len(), 1);
    }
}
