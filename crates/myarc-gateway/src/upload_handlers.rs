//! Image upload and stale-upload cleanup handlers.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use myarc_journal::STALE_UPLOAD_THRESHOLD_MS;

use crate::auth::authorize_request;
use crate::error::ApiError;
use crate::AppState;

pub(crate) async fn handle_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                return ApiError::BadRequest(format!("multipart error: {error}")).into_response()
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(error) => {
                return ApiError::BadRequest(format!("failed to read file field: {error}"))
                    .into_response()
            }
        };

        return match state
            .lifecycle
            .upload_asset(&user.id, &file_name, &content_type, bytes)
            .await
        {
            Ok(uploaded) => Json(uploaded).into_response(),
            Err(error) => ApiError::from(error).into_response(),
        };
    }

    ApiError::BadRequest("missing 'file' field in multipart form".to_string()).into_response()
}

pub(crate) async fn handle_cleanup_stale(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(error) = authorize_request(&state, &headers) {
        return error.into_response();
    }

    match state
        .lifecycle
        .sweep_stale_uploads(STALE_UPLOAD_THRESHOLD_MS)
        .await
    {
        Ok(0) => Json(json!({ "deleted": 0, "message": "No stale uploads found" }))
            .into_response(),
        Ok(deleted) => Json(json!({
            "deleted": deleted,
            "message": format!("Cleaned up {deleted} orphaned image(s)"),
        }))
        .into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}
