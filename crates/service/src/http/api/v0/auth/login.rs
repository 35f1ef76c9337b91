use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TOKEN_TYPE;
use crate::http::api::ApiError;
use crate::ServiceState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// seconds until the access token expires
    pub expires_in: i64,
    pub user_id: Uuid,
    pub username: String,
    /// base64 salt for deriving the client master key
    pub kdf_salt: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.auth().login(&req.username, &req.password).await?;

    Ok(Json(LoginResponse {
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token.as_str().to_string(),
        token_type: TOKEN_TYPE.to_string(),
        expires_in: outcome.tokens.expires_in,
        user_id: outcome.user_id,
        username: outcome.username,
        kdf_salt: outcome.kdf_salt.to_base64(),
    }))
}
