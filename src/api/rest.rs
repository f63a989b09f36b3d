// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//
//   GET  /api/v1/health    liveness + state version
//   POST /api/v1/analyze   run the pipeline for a ticker, returns RunState
//   GET  /api/v1/runs      recent run envelopes
//   GET  /api/v1/state     run + error audit snapshot
//   GET  /api/v1/config    active runtime configuration
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app_state::AppState;
use crate::types::RawRecord;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with tracing + CORS middleware and shared
/// state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/runs", get(runs))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/config", get(config))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Analyze
// =============================================================================

/// Page text scraped by the caller.
#[derive(Deserialize)]
struct SuppliedRecord {
    url: String,
    text: String,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    ticker: String,
    /// When present, search and scrape are skipped.
    #[serde(default)]
    records: Option<Vec<SuppliedRecord>>,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let ticker = req.ticker.trim().to_string();

    let run = match req.records {
        Some(records) => {
            let now = Utc::now();
            let records = records
                .into_iter()
                .map(|r| RawRecord::new(r.url, r.text, now))
                .collect();
            state.pipeline.run_records(&ticker, records).await
        }
        None => state.pipeline.run(&ticker).await,
    };

    let envelope = state.record_run(&run);
    info!(
        run_id = %envelope.id,
        ticker = %envelope.ticker,
        priced = envelope.priced,
        anomalous = envelope.anomalous,
        "analysis served"
    );

    Json(run)
}

// =============================================================================
// Audit trail
// =============================================================================

async fn runs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let runs = state.recent_runs.read().clone();
    Json(runs)
}

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Config
// =============================================================================

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime_config.clone())
}
