//! Current user endpoint

use axum::extract::State;
use serde::Serialize;
use uuid::Uuid;

use crate::api::middleware::AuthenticatedPrincipal;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::user::User;

/// User response (safe to expose)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub verified: bool,
    pub role: String,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            email: user.email().to_string(),
            verified: user.is_verified(),
            role: user.role().to_string(),
            created_at: user.created_at().to_rfc3339(),
        }
    }
}

/// GET /api/v1/me
pub async fn me(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.me(principal.user_id()?).await?;
    Ok(Json(UserResponse::from(&user)))
}
