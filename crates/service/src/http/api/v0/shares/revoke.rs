use axum::extract::{Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::http::api::{ApiError, Authenticated};
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
    Path(share_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.shares().revoke(share_id, auth.claims.sub).await?;
    Ok(http::StatusCode::NO_CONTENT)
}
