use axum::Router;

pub mod auth;
pub mod shares;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/shares", shares::router(state.clone()))
        .with_state(state)
}
