//! Email verification link target

use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::DomainError;

use super::auth::MessageResponse;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
    pub uid: Option<String>,
}

/// GET /api/v1/verify?token=…&uid=…
///
/// Every redemption failure is a 400 since the link itself is what is wrong.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("token is required"))?;
    let user_id = query
        .uid
        .as_deref()
        .and_then(|uid| Uuid::parse_str(uid).ok())
        .ok_or_else(|| ApiError::bad_request("uid must be a valid user id"))?;

    match state.auth.verify_email(&token, user_id).await {
        Ok(()) => Ok(Json(MessageResponse::new("email verified successfully"))),
        Err(DomainError::NotFound { .. }) => {
            debug!(user_id = %user_id, "Unknown verification token");
            Err(ApiError::bad_request("invalid or expired verification link"))
        }
        Err(DomainError::Expired { .. }) => {
            Err(ApiError::bad_request("verification link expired"))
        }
        Err(e) => Err(e.into()),
    }
}
