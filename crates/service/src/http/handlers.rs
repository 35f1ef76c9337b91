use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Fallback for unrouted paths. API clients get the same JSON error body the
/// handlers produce; anything else gets plain text.
pub async fn not_found_handler(uri: Uri, headers: HeaderMap) -> Response {
    tracing::debug!(path = %uri.path(), "no route");

    let wants_text = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.starts_with("text/"))
        .unwrap_or(false);

    if wants_text {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "not found",
        )
            .into_response();
    }
    let body = serde_json::json!({"error": "not found"});
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
