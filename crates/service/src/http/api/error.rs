use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::AuthError;
use crate::share::{DenyReason, ShareError};

/// Error type shared by the API handlers.
///
/// Credential and share refusals map to fixed messages; internal failures are
/// logged and reported without detail.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("auth: {0}")]
    Auth(#[from] AuthError),
    #[error("share: {0}")]
    Share(#[from] ShareError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Auth(e) => match e {
                AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".into()),
                AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                AuthError::UsernameTaken => {
                    (StatusCode::CONFLICT, "username already exists".into())
                }
                AuthError::Crypto(_) | AuthError::Store(_) | AuthError::Internal(_) => internal(),
            },
            ApiError::Share(e) => match e {
                ShareError::Denied(reason) if reason.is_gone() => {
                    (StatusCode::GONE, reason.to_string())
                }
                ShareError::Denied(DenyReason::PasswordMismatch) => (
                    StatusCode::FORBIDDEN,
                    DenyReason::PasswordMismatch.to_string(),
                ),
                ShareError::Denied(reason) => (StatusCode::NOT_FOUND, reason.to_string()),
                ShareError::NotOwner => (StatusCode::FORBIDDEN, "forbidden".into()),
                ShareError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ShareError::Contention => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "share is busy, try again".into(),
                ),
                ShareError::Store(_) => internal(),
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".into(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("API ERROR: {}", self);
        } else {
            tracing::debug!("API ERROR: {}", self);
        }
        let body = serde_json::json!({"error": message});
        (status, Json(body)).into_response()
    }
}
