mod common;

use ::common::crypto::{AccessHash, Secret};
use http::StatusCode;
use serde_json::{json, Value};
use time::Duration;

use service::http::router;
use service::ManualClock;

use crate::common::{memory_state, send, PASSWORD, START};

async fn login(router: &axum::Router, username: &str) -> Value {
    let (status, _) = send(
        router,
        "POST",
        "/api/v0/auth/register",
        None,
        Some(json!({"username": username, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        router,
        "POST",
        "/api/v0/auth/login",
        None,
        Some(json!({"username": username, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn sealed_content() -> String {
    let key = Secret::generate().unwrap();
    key.seal(b"the launch code").unwrap().to_base64()
}

#[tokio::test]
async fn test_status_routes() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);

    let (status, body) = send(&router, "GET", "/_status/livez", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&router, "GET", "/_status/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&router, "GET", "/_status/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());

    let (status, _) = send(&router, "GET", "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auth_flow() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);

    let body = login(&router, "alice").await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 15 * 60);
    assert!(body["kdf_salt"].is_string());
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    // duplicate username
    let (status, _) = send(
        &router,
        "POST",
        "/api/v0/auth/register",
        None,
        Some(json!({"username": "alice", "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // weak password
    let (status, body) = send(
        &router,
        "POST",
        "/api/v0/auth/register",
        None,
        Some(json!({"username": "bob", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // wrong password and unknown user look the same
    let (status, wrong) = send(
        &router,
        "POST",
        "/api/v0/auth/login",
        None,
        Some(json!({"username": "alice", "password": "Wr0ng!Password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, unknown) = send(
        &router,
        "POST",
        "/api/v0/auth/login",
        None,
        Some(json!({"username": "nobody", "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);

    // refresh rotates
    let (status, body) = send(
        &router,
        "POST",
        "/api/v0/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["refresh_token"].as_str().unwrap(), refresh);
    let (status, _) = send(
        &router,
        "POST",
        "/api/v0/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // logout without a body, then the token is dead
    let (status, _) = send(&router, "GET", "/api/v0/shares", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&router, "POST", "/api/v0/auth/logout", Some(&access), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, "GET", "/api/v0/shares", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_need_a_bearer() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);

    let (status, _) = send(&router, "GET", "/api/v0/shares", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&router, "GET", "/api/v0/shares", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let body = login(&router, "carol").await;
    let access = body["access_token"].as_str().unwrap().to_string();

    clock.advance(Duration::minutes(15));
    let (status, _) = send(&router, "GET", "/api/v0/shares", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_with_spent_token_is_refused() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);

    let old = login(&router, "dave").await;
    let old_access = old["access_token"].as_str().unwrap().to_string();
    let (status, _) = send(&router, "POST", "/api/v0/auth/logout", Some(&old_access), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    clock.advance(Duration::hours(2));
    let (status, fresh) = send(
        &router,
        "POST",
        "/api/v0/auth/login",
        None,
        Some(json!({"username": "dave", "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, "POST", "/api/v0/auth/logout", Some(&old_access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &router,
        "POST",
        "/api/v0/auth/refresh",
        None,
        Some(json!({"refresh_token": fresh["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_share_lifecycle() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);
    let owner = login(&router, "owner").await;
    let owner_token = owner["access_token"].as_str().unwrap().to_string();
    let other = login(&router, "mallory").await;
    let other_token = other["access_token"].as_str().unwrap().to_string();

    let content = sealed_content();
    let (status, created) = send(
        &router,
        "POST",
        "/api/v0/shares",
        Some(&owner_token),
        Some(json!({"content_enc": content, "max_views": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["state"], "active");
    assert_eq!(created["current_views"], 0);
    let share_id = created["share_id"].as_str().unwrap().to_string();
    let access_uri = format!("/api/v0/shares/{}/access", share_id);

    // anonymous access
    let (status, viewed) = send(&router, "POST", &access_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(viewed["content_enc"].as_str().unwrap(), content);
    assert_eq!(viewed["views_remaining"], 1);

    // a stranger cannot revoke
    let share_uri = format!("/api/v0/shares/{}", share_id);
    let (status, _) = send(&router, "DELETE", &share_uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&router, "DELETE", &share_uri, Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&router, "POST", &access_uri, None, None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "share has been revoked");

    let (status, listed) = send(&router, "GET", "/api/v0/shares", Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["state"], "revoked");
    assert_eq!(listed[0]["current_views"], 1);

    let unknown = format!("/api/v0/shares/{}/access", uuid::Uuid::new_v4());
    let (status, _) = send(&router, "POST", &unknown, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_password_share_and_expiry() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);
    let owner = login(&router, "dave").await;
    let token = owner["access_token"].as_str().unwrap().to_string();

    let hash = AccessHash::from_password("open sesame").unwrap();
    let expires_at = time::OffsetDateTime::from_unix_timestamp(START + 60)
        .unwrap()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap();
    let (status, created) = send(
        &router,
        "POST",
        "/api/v0/shares",
        Some(&token),
        Some(json!({
            "content_enc": sealed_content(),
            "access_hash": hash.to_hex(),
            "expires_at": expires_at,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["has_password"], true);
    let access_uri = format!(
        "/api/v0/shares/{}/access",
        created["share_id"].as_str().unwrap()
    );

    let (status, _) = send(&router, "POST", &access_uri, None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let wrong = AccessHash::from_password("guess").unwrap();
    let (status, _) = send(
        &router,
        "POST",
        &access_uri,
        None,
        Some(json!({"access_hash": wrong.to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, viewed) = send(
        &router,
        "POST",
        &access_uri,
        None,
        Some(json!({"access_hash": hash.to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(viewed["views_remaining"].is_null());

    clock.advance(Duration::seconds(60));
    let (status, _) = send(
        &router,
        "POST",
        &access_uri,
        None,
        Some(json!({"access_hash": hash.to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_share_create_rejects_bad_input() {
    let clock = ManualClock::at_unix(START);
    let router = router(memory_state(&clock).await);
    let owner = login(&router, "erin").await;
    let token = owner["access_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &router,
        "POST",
        "/api/v0/shares",
        Some(&token),
        Some(json!({"content_enc": sealed_content(), "max_views": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        "POST",
        "/api/v0/shares",
        Some(&token),
        Some(json!({"content_enc": "AAAA"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
