//! Bearer-token caller resolution at the gateway boundary.
//!
//! Session management proper lives outside this service; every request
//! arrives with a bearer token that maps to exactly one user row. Ownership
//! checks downstream always use the resolved user id, never anything the
//! client supplies.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use myarc_store::UserRecord;

use crate::error::ApiError;
use crate::AppState;

pub(crate) fn authorize_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<UserRecord, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    state
        .db
        .find_user_by_token(token)
        .map_err(|error| ApiError::Internal(error.to_string()))?
        .ok_or(ApiError::Unauthorized)
}
