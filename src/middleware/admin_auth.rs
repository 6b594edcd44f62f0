use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::util::{constant_time_eq, extract_bearer_token};

/// Shared-secret bearer auth for admin endpoints.
///
/// With no key configured the endpoints are open (development mode). With a
/// key configured: missing Authorization header is 401, a wrong key is 403.
pub async fn admin_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = extract_bearer_token(&headers).ok_or(AppError::Unauthorized)?;

    if !constant_time_eq(token, expected) {
        return Err(AppError::Forbidden(msg::INVALID_ADMIN_KEY.into()));
    }

    Ok(next.run(request).await)
}
