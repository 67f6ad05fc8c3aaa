//! Auth Gate - bearer token admission and principal injection

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::user::User;
use crate::domain::DomainError;

const BEARER_SCHEME: &str = "bearer";

/// Principal resolved from a verified access token, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    subject: String,
}

impl AuthenticatedPrincipal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn user_id(&self) -> Result<Uuid, ApiError> {
        Uuid::parse_str(&self.subject).map_err(|_| ApiError::unauthorized("invalid token subject"))
    }
}

/// Read the access token from `Authorization: <scheme> <token>`
///
/// The value must split on single spaces into exactly two non-empty fields and the
/// scheme must be `bearer` in any case.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("authorization header is not provided"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid authorization header format"))?;

    let fields: Vec<&str> = value.split(' ').collect();
    let [scheme, token] = fields.as_slice() else {
        return Err(ApiError::unauthorized("invalid authorization header format"));
    };
    if scheme.is_empty() || token.is_empty() {
        return Err(ApiError::unauthorized("invalid authorization header format"));
    }

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(ApiError::unauthorized(format!(
            "unsupported authorization type {}",
            scheme
        )));
    }

    Ok((*token).to_string())
}

/// Middleware for protected routes: verify the bearer token and inject the principal
pub async fn auth_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;

    let claims = state.auth.codec().verify(&token).map_err(|e| match e {
        DomainError::Expired { .. } => {
            ApiError::unauthorized("access token has expired").with_code("token_expired")
        }
        other => {
            debug!(error = %other, "Rejected access token");
            ApiError::unauthorized("invalid access token")
        }
    })?;

    request
        .extensions_mut()
        .insert(AuthenticatedPrincipal::new(claims.sub));

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

/// Extractor for admin-only handlers. Loads the principal's account and requires the
/// admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = AuthenticatedPrincipal::from_request_parts(parts, state).await?;
        let user = state.auth.principal_user(principal.subject()).await?;

        if !user.role().is_admin() {
            debug!(user_id = %user.id(), "Admin access denied");
            return Err(ApiError::forbidden("admin access required"));
        }

        Ok(RequireAdmin(user))
    }
}
