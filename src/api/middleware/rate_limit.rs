//! Rate limit middleware
//!
//! Runs after the Auth Gate on protected routes so the authenticated principal is the
//! counter key; public routes fall back to the client address.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::rate_limit::RateLimitDecision;
use crate::infrastructure::observability::record_rate_limit_rejection;

use super::auth::AuthenticatedPrincipal;
use super::client::client_ip;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Apply the configured rule for the matched route. Store failures reject the request.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(route) = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
    else {
        return next.run(request).await;
    };

    let principal = match request.extensions().get::<AuthenticatedPrincipal>() {
        Some(principal) => principal.subject().to_string(),
        None => client_ip(
            request.headers(),
            request.extensions(),
            state.trust_forwarded_headers,
        ),
    };

    let decision = match state.rate_limiter.check(&route, &principal).await {
        Ok(Some(decision)) => decision,
        Ok(None) => return next.run(request).await,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if !decision.is_allowed() {
        warn!(route = %route, principal = %principal, "Rate limit exceeded");
        record_rate_limit_rejection(&route);

        let mut response = ApiError::rate_limited("rate limit exceeded").into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(HEADER_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(
        HEADER_REMAINING,
        HeaderValue::from(decision.remaining_for_display()),
    );
    headers.insert(HEADER_RESET, HeaderValue::from(decision.reset_at.timestamp()));
}
