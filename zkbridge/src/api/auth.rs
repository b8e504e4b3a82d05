//! API key gate
//!
//! The key is accepted as `Authorization: Bearer <key>`, an `X-Api-Key`
//! header or an `api_key` query parameter.

use axum::extract::{Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
struct KeyQuery {
    api_key: Option<String>,
}

/// Reject requests without the configured key before any handler runs
pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key() else {
        return Ok(next.run(request).await);
    };

    let presented = header_key(request.headers()).or_else(|| {
        Query::<KeyQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(query)| query.api_key)
    });

    if presented.as_deref() != Some(expected) {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected request with {} API key",
            if presented.is_some() { "invalid" } else { "missing" }
        );
        return Err(ApiError::unauthorized());
    }

    Ok(next.run(request).await)
}

fn header_key(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());

    bearer.or_else(|| {
        headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    })
}
