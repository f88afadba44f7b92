//! Bearer-token middleware for the protected routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

/// Reject requests without `Authorization: Bearer <api key>`.
///
/// A missing or malformed header is 401, a well-formed but wrong token is 403.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "request without bearer token");
        return Err(ApiError::Unauthorized);
    };
    if token != &*state.api_key {
        warn!(path = %request.uri().path(), "request with invalid API key");
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(request).await)
}
