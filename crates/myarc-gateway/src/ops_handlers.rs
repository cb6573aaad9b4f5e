//! Health, admin, and cron handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use myarc_journal::run_momentum_nudges;

use crate::auth::authorize_request;
use crate::error::ApiError;
use crate::AppState;

pub(crate) async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) async fn handle_setup_memory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(error) = authorize_request(&state, &headers) {
        return error.into_response();
    }

    match state.memory.initialize_project().await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Memory project initialized with categories",
        }))
        .into_response(),
        Err(error) => ApiError::Internal(error.to_string()).into_response(),
    }
}

pub(crate) async fn handle_cron_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(error) = authorize_request(&state, &headers) {
        return error.into_response();
    }

    match run_momentum_nudges(&state.db, &state.insight, &state.memory, &state.notifier).await {
        Ok(results) => Json(json!({ "success": true, "results": results })).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}
