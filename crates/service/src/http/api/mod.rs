use axum::Router;

mod bearer;
mod error;
pub mod v0;

pub use bearer::{Authenticated, Bearer};
pub use error::ApiError;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/v0", v0::router(state.clone()))
        .with_state(state)
}
