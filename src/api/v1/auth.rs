//! Account endpoints: register, login, refresh and logout

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::{AuthenticatedPrincipal, RequestClient};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::token::TokenPair;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// POST /api/v1/register
pub async fn register(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let user = state
        .auth
        .register(&request.email, &request.password, &client)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "registration successful, check your email to verify your account"
                .to_string(),
            user_id: user.id(),
        }),
    ))
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state
        .auth
        .login(&request.email, &request.password, &client)
        .await?;

    Ok(Json(pair))
}

/// POST /api/v1/refresh
///
/// The presented token is consumed; a second use of it is rejected.
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /api/v1/logout
pub async fn logout(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if request.refresh_token.is_empty() {
        return Err(ApiError::bad_request("refresh_token is required"));
    }

    state
        .auth
        .logout(principal.user_id()?, &request.refresh_token)
        .await?;

    Ok(Json(MessageResponse::new("logged out")))
}
