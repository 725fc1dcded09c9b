//! HTTP API (Axum) over the corpora core.

pub mod config;
pub mod documents;
pub mod error;
pub mod models;
pub mod qa;
pub mod sessions;
pub mod state;


pub use error::ApiError;
pub use state::AppState;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router over an assembled [`AppState`].
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/documents/upload", post(documents::upload))
        .route("/documents/", get(documents::list))
        .route("/documents/{id}", get(documents::get))
        .route("/documents/{id}/reprocess", post(documents::reprocess))
        .route("/documents/{id}", delete(documents::delete))
        .route("/qa/ask", post(qa::ask))
        .route("/sessions/", post(sessions::create))
        .route("/sessions/recent", get(sessions::recent))
        .route("/sessions/{id}/history", get(sessions::history))
        .route("/sessions/{id}", delete(sessions::delete))
        .route("/sessions/stats/summary", get(sessions::stats))
        .route("/config/", get(config::get_all))
        .route("/config/validate", post(config::validate))
        .route("/config/reload", post(config::reload))
        .route("/config/{section}", get(config::get_section))
        .route("/config/{section}", put(config::update_section))
        .route("/models/add", post(models::add))
        .route("/models/test", post(models::test))
        .route("/models/configs", get(models::configs))
        .route("/models/switch", post(models::switch))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(serde::Serialize)]
struct ReadyResponse {
    status: &'static str,
    components: ComponentStatus,
}

#[derive(serde::Serialize)]
struct ComponentStatus {
    http: &'static str,
    database: &'static str,
    vector_store: &'static str,
    models: &'static str,
}

async fn health_handler() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    let database = match state.db.stats_summary().await {
        Ok(_) => "ready",
        Err(_) => "error",
    };
    let vector_store = match state.vectors.collection_info().await {
        Ok(_) => "ready",
        Err(_) => "error",
    };
    let models = if state.registry.get_configs().is_empty() {
        "pending"
    } else {
        "ready"
    };

    let components = ComponentStatus {
        http: "ready",
        database,
        vector_store,
        models,
    };
    let is_ready = database == "ready" && vector_store == "ready" && models == "ready";

    let status_code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status_code,
        Json(ReadyResponse {
            status: if is_ready { "ok" } else { "pending" },
            components,
        }),
    )
        .into_response()
}
