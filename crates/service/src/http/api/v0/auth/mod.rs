use axum::routing::post;
use axum::Router;

pub mod login;
pub mod logout;
pub mod refresh;
pub mod register;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/register", post(register::handler))
        .route("/login", post(login::handler))
        .route("/refresh", post(refresh::handler))
        .route("/logout", post(logout::handler))
        .with_state(state)
}
