use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::access::Action;
use crate::auth::{OptionalAuth, RequireUser};
use crate::lifecycle::{ItemChanges, ItemDraft, ItemLifecycle};
use crate::server::AppState;
use crate::server::pipeline::{
    LoadCollectionAndCategory, LoadItem, Pipeline, PrepareItemCreate, PrepareItemUpdate,
    RequestContext, RequireAuthenticated, RequireItemCreation, RequireItemDeleter,
    RequireItemEditor, RequireOwnerOnlyItemCreation, ResolveAccess,
};
use crate::server::response::{ApiError, ApiResponse};

pub async fn create_item(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ItemDraft>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let collection_id = draft.collection_id.clone();

    let item = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadCollectionAndCategory(Some(collection_id)))
        .then(RequireItemCreation)
        .then(PrepareItemCreate(draft))
        .then(RequireOwnerOnlyItemCreation)
        .run(store, RequestContext::new(Some(auth.user)))?
        .take_prepared_item()?;

    ItemLifecycle::new(store).insert(&item)?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

pub async fn get_item(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let item = Pipeline::new()
        .then(LoadItem(id))
        .then(LoadCollectionAndCategory(None))
        .then(ResolveAccess(Action::Read))
        .run(state.store.as_ref(), RequestContext::new(auth.user))?
        .take_item()?;

    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn update_item(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<ItemChanges>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let item = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadItem(id))
        .then(LoadCollectionAndCategory(None))
        .then(RequireItemEditor)
        .then(PrepareItemUpdate(changes))
        .run(store, RequestContext::new(Some(auth.user)))?
        .take_prepared_item()?;

    ItemLifecycle::new(store).save(&item)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn delete_item(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let item = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadItem(id))
        .then(RequireItemDeleter)
        .run(store, RequestContext::new(Some(auth.user)))?
        .take_item()?;

    ItemLifecycle::new(store).delete(&item)?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
