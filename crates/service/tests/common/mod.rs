#![allow(dead_code)]

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use service::{
    Database, ManualClock, ServiceState, SharedClock, SigningSecret, TrustContext,
};

pub const PASSWORD: &str = "Str0ng!Passw0rd";
pub const START: i64 = 1_700_000_000;

pub fn context(clock: &ManualClock) -> TrustContext {
    let clock: SharedClock = std::sync::Arc::new(clock.clone());
    TrustContext::new(SigningSecret::new(vec![42u8; 32]).unwrap(), clock)
}

pub async fn memory_state(clock: &ManualClock) -> ServiceState {
    let database = Database::in_memory().await.unwrap();
    ServiceState::new(database, context(clock), 2).unwrap()
}

/// Fire one request at the router and decode the JSON body, if any.
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
