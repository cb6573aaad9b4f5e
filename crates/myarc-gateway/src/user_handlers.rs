//! User profile handlers. The serialized `UserRecord` carries no secrets;
//! tokens live only in the auth column and never leave the store.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use myarc_store::ProfileChanges;

use crate::auth::authorize_request;
use crate::error::ApiError;
use crate::AppState;

pub(crate) async fn handle_get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    match authorize_request(&state, &headers) {
        Ok(user) => Json(user).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn handle_patch_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(changes): Json<ProfileChanges>,
) -> Response {
    let user = match authorize_request(&state, &headers) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    match state.db.update_user_profile(&user.id, &changes) {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => ApiError::NotFound.into_response(),
        Err(error) => ApiError::Internal(error.to_string()).into_response(),
    }
}
