use axum::extract::{Json, State};
use axum::response::IntoResponse;

use super::ShareSummary;
use crate::http::api::{ApiError, Authenticated};
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    auth: Authenticated,
) -> Result<impl IntoResponse, ApiError> {
    let now = state.shares().now();
    let shares = state.shares().list(auth.claims.sub).await?;
    let summaries: Vec<ShareSummary> = shares
        .iter()
        .map(|share| ShareSummary::new(share, now))
        .collect();
    Ok(Json(summaries))
}
