use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use common::crypto::{AccessHash, Envelope, SecretShare};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::api::ApiError;
use crate::ServiceState;

#[derive(Debug, Default, Deserialize)]
pub struct AccessRequest {
    #[serde(default)]
    pub access_hash: Option<AccessHash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub share_id: Uuid,
    pub content_enc: Envelope,
    pub wrapped_key: Option<SecretShare>,
    pub views_remaining: Option<i64>,
}

/// Anonymous: possession of the link and, if set, the access hash is the
/// only credential.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(share_id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: AccessRequest = if body.is_empty() {
        AccessRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid access body: {}", e)))?
    };

    let content = state
        .shares()
        .access(share_id, req.access_hash.as_ref())
        .await?;

    Ok(Json(AccessResponse {
        share_id: content.share_id,
        content_enc: content.envelope,
        wrapped_key: content.key,
        views_remaining: content.views_remaining,
    }))
}
