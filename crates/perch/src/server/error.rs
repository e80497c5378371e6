use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use perch_core::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAddress(_) | CoreError::Refinement(_) => {
                Self::BadRequest(err.to_string())
            }
            CoreError::Backend(_) | CoreError::Store(_) => Self::BadGateway(err.to_string()),
        }
    }
}
