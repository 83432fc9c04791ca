use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::routes::AppState;

/// Page-level policy: same-origin only, with `blob:` allowed for previews.
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    img-src 'self' data: blob:; media-src 'self' blob:; \
    style-src 'self'; script-src 'self'; frame-ancestors 'none'";

/// Bearer token authentication for admin endpoints.
///
/// Extracts the `Authorization: Bearer <token>` header and compares it
/// against the configured admin token. Returns 401 Unauthorized on mismatch.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == state.config.admin_token => Ok(next.run(request).await),
        _ => {
            tracing::warn!("rejected admin request");
            Err(AppError::Unauthorized)
        }
    }
}

/// Add default security headers unless the handler already set them.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    set_default(
        headers,
        header::CONTENT_SECURITY_POLICY,
        CONTENT_SECURITY_POLICY,
    );
    set_default(headers, header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    set_default(headers, header::X_FRAME_OPTIONS, "DENY");
    set_default(headers, header::REFERRER_POLICY, "no-referrer");
    response
}

/// Headers for raw blob responses: the browser must not run anything it loads.
pub fn apply_sandbox_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("sandbox"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
}

fn set_default(headers: &mut HeaderMap, name: header::HeaderName, value: &'static str) {
    headers
        .entry(name)
        .or_insert_with(|| HeaderValue::from_static(value));
}
