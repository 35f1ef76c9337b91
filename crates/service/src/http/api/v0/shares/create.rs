use axum::extract::{Json, State};
use axum::response::IntoResponse;
use common::crypto::{AccessHash, Envelope, SecretShare};
use serde::Deserialize;
use time::OffsetDateTime;

use super::ShareSummary;
use crate::http::api::{ApiError, Authenticated};
use crate::share::NewShare;
use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// base64 of nonce || ciphertext || tag
    pub content_enc: Envelope,
    /// base64 content key wrapped for a named recipient
    #[serde(default)]
    pub wrapped_key: Option<SecretShare>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub max_views: Option<i64>,
    /// hex access hash the viewer must present
    #[serde(default)]
    pub access_hash: Option<AccessHash>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
    Json(req): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let share = state
        .shares()
        .create(
            auth.claims.sub,
            NewShare {
                envelope: req.content_enc,
                key: req.wrapped_key,
                expires_at: req.expires_at,
                max_views: req.max_views,
                access_hash: req.access_hash,
            },
        )
        .await?;

    Ok((
        http::StatusCode::CREATED,
        Json(ShareSummary::new(&share, state.shares().now())),
    ))
}
