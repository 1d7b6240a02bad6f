use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::access::Action;
use crate::auth::{OptionalAuth, RequireUser};
use crate::server::AppState;
use crate::server::dto::AddAllowedUserRequest;
use crate::server::pipeline::{
    LoadAllowListCandidate, LoadCollection, Pipeline, RequestContext, RequireAuthenticated,
    ResolveAccess,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::validation::validate_username;

use super::collections::readable;

pub async fn list_allowed_users(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let collection = readable(&state, auth.user, id)?;

    let users = state
        .store
        .list_allowed_users(&collection.id)
        .api_err("Failed to list allowed users")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}

/// Grants read access to one user. The collection becomes private.
pub async fn add_allowed_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddAllowedUserRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut ctx = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadCollection(id))
        .then(ResolveAccess(Action::Administer))
        .then(LoadAllowListCandidate(req.username))
        .run(store, RequestContext::new(Some(auth.user)))?;
    let collection = ctx.take_collection()?;
    let user = ctx.take_subject_user()?;

    store
        .add_allowed_user(&collection.id, &user.id)
        .api_err("Failed to add allowed user")?;
    tracing::info!(collection = %collection.id, user = %user.username, "allowed user added");

    let users = store
        .list_allowed_users(&collection.id)
        .api_err("Failed to list allowed users")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}

/// Revokes read access. Removing a user who was not listed is a no-op.
pub async fn remove_allowed_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, username)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let collection = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadCollection(id))
        .then(ResolveAccess(Action::Administer))
        .run(store, RequestContext::new(Some(auth.user)))?
        .take_collection()?;

    validate_username(&username).map_err(|e| ApiError::bad_request("INVALID_USERNAME", e))?;
    let user = store
        .get_user_by_username(&username)
        .api_err("Failed to get user")?
        .or_not_found("USER_NOT_FOUND", "User not found")?;

    if store
        .remove_allowed_user(&collection.id, &user.id)
        .api_err("Failed to remove allowed user")?
    {
        tracing::info!(collection = %collection.id, user = %user.username, "allowed user removed");
    }

    let users = store
        .list_allowed_users(&collection.id)
        .api_err("Failed to list allowed users")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}
