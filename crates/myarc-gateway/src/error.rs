use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use myarc_journal::EntryError;

#[derive(Debug, Error)]
/// HTTP-surface error taxonomy. Auxiliary-step degradation never appears
/// here; a save that limped through asset cleanup still returns 200.
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EntryError> for ApiError {
    fn from(error: EntryError) -> Self {
        match error {
            EntryError::Validation(message) => ApiError::BadRequest(message),
            EntryError::InvalidUpload(message) => ApiError::BadRequest(message),
            EntryError::NotFound => ApiError::NotFound,
            EntryError::Store(_) | EntryError::Codec(_) | EntryError::Asset(_) => {
                ApiError::Internal(error.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Internal(detail) => {
                // Detail goes to the log stream, not the client.
                tracing::error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
