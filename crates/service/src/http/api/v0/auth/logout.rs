use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::RefreshToken;
use crate::http::api::{ApiError, Authenticated};
use crate::ServiceState;

#[derive(Default, Deserialize)]
pub struct LogoutRequest {
    /// end only this session; without it every session of the user ends
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The body is optional, so it is read raw rather than through `Json`.
pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid logout body: {}", e)))?
    };

    let refresh_token = req
        .refresh_token
        .as_deref()
        .map(RefreshToken::parse)
        .transpose()?;

    state
        .auth()
        .end_session(&auth.claims, refresh_token.as_ref())
        .await?;

    Ok(http::StatusCode::NO_CONTENT)
}
