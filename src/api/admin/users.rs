//! Admin user management endpoints

use axum::extract::State;
use serde::Serialize;
use tracing::debug;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::api::v1::users::UserResponse;

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
    pub total: usize,
}

/// GET /api/v1/admin/users - newest first
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<ListUsersResponse>, ApiError> {
    debug!(admin_id = %admin.id(), "Listing users");

    let users: Vec<UserResponse> = state
        .auth
        .list_users()
        .await?
        .iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(ListUsersResponse {
        total: users.len(),
        users,
    }))
}
