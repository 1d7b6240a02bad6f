use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{PaginationParams, UpdateUserRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::types::Role;

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = state
        .store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list users")?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

pub async fn update_user(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    let mut user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("USER_NOT_FOUND", "User not found")?;

    // An admin cannot lock themselves out.
    if user.id == admin.user.id
        && (req.role == Some(Role::User) || req.is_active == Some(false))
    {
        return Err(ApiError::bad_request(
            "CANNOT_MODIFY_SELF",
            "Admins cannot demote or deactivate their own account",
        ));
    }

    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(is_active) = req.is_active {
        user.is_active = is_active;
    }
    user.updated_at = Utc::now();

    state
        .store
        .update_user(&user)
        .api_err("Failed to update user")?;

    tracing::info!(
        user = %user.username,
        role = %user.role,
        active = user.is_active,
        by = %admin.user.username,
        "user updated"
    );

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}
