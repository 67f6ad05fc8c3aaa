use axum::{
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

use super::admin;
use super::health;
use super::middleware::{auth_gate, logging_middleware, metrics_middleware, rate_limit_middleware};
use super::state::AppState;
use super::v1;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the full router with application state
///
/// Routes are registered with their full paths so `MatchedPath` equals the rate limit
/// rule key. On protected routes the Auth Gate runs before the rate limiter, which then
/// counts per principal instead of per address.
pub fn create_router(
    state: AppState,
    metrics: Option<PrometheusMetrics>,
    metrics_path: &str,
) -> Router {
    let public = Router::new()
        .route(v1::REGISTER_PATH, post(v1::auth::register))
        .route(v1::LOGIN_PATH, post(v1::auth::login))
        .route(v1::REFRESH_PATH, post(v1::auth::refresh))
        .route(v1::VERIFY_PATH, get(v1::verify::verify_email))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let protected = Router::new()
        .route(v1::LOGOUT_PATH, post(v1::auth::logout))
        .route(v1::ME_PATH, get(v1::users::me))
        .route(admin::USERS_PATH, get(admin::users::list_users))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_gate));

    let mut router = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .merge(public)
        .merge(protected)
        .with_state(state);

    if let Some(metrics) = metrics {
        router = router.merge(create_metrics_router(metrics, metrics_path));
    }

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Layers run bottom-up: the request id exists before anything logs.
    router
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
