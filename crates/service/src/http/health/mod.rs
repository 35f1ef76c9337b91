use axum::routing::get;
use axum::Router;

use crate::ServiceState;

mod data_source;
mod livez;
mod readyz;
mod version;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/livez", get(livez::handler))
        .route("/readyz", get(readyz::handler))
        .route("/version", get(version::handler))
        .with_state(state)
}
