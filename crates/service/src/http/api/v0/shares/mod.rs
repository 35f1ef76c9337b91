use axum::routing::{delete, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod access;
pub mod create;
pub mod list;
pub mod revoke;

use crate::share::{ShareRecord, ShareState};
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", post(create::handler).get(list::handler))
        .route("/:share_id", delete(revoke::handler))
        .route("/:share_id/access", post(access::handler))
        .with_state(state)
}

/// Owner-facing view of a share. Never carries the content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSummary {
    pub share_id: Uuid,
    pub state: ShareState,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub max_views: Option<i64>,
    pub current_views: i64,
    pub has_password: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_accessed_at: Option<OffsetDateTime>,
}

impl ShareSummary {
    pub fn new(share: &ShareRecord, now: OffsetDateTime) -> Self {
        Self {
            share_id: share.id,
            state: share.state(now),
            expires_at: share.expires_at,
            max_views: share.max_views,
            current_views: share.current_views,
            has_password: share.has_password(),
            created_at: share.created_at,
            last_accessed_at: share.last_accessed_at,
        }
    }
}
