//! Entry CRUD and listing handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use myarc_journal::EntryDraft;

use crate::auth::authorize_request;
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_SIMILAR_LIMIT: usize = 10;

#[derive(Debug, Deserialize, Default)]
pub(crate) struct ListEntriesQuery {
    q: Option<String>,
    similar_to: Option<String>,
    limit: Option<usize>,
}

pub(crate) async fn handle_create_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<EntryDraft>,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    match state.lifecycle.create_entry(&user.id, draft).await {
        Ok(saved) => Json(saved.entry).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}

pub(crate) async fn handle_list_entries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListEntriesQuery>,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    let result = match query.similar_to.as_deref() {
        Some(reference_id) => state.lifecycle.similar_entries(
            &user.id,
            reference_id,
            query.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT),
        ),
        None => state.lifecycle.list_entries(&user.id, query.q.as_deref()),
    };

    match result {
        Ok(items) => Json(items).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}

pub(crate) async fn handle_get_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<String>,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    match state.lifecycle.get_entry(&user.id, &entry_id) {
        Ok(entry) => Json(entry).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}

pub(crate) async fn handle_update_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<String>,
    Json(draft): Json<EntryDraft>,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    match state.lifecycle.update_entry(&user.id, &entry_id, draft).await {
        // The response body carries the plaintext the caller submitted, not
        // re-decrypted ciphertext.
        Ok(saved) => Json(saved.entry).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}

pub(crate) async fn handle_delete_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<String>,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    match state.lifecycle.delete_entry(&user.id, &entry_id).await {
        Ok(()) => Json(json!({ "message": "Entry deleted" })).into_response(),
        Err(error) => ApiError::from(error).into_response(),
    }
}
