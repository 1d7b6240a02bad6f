use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::access::Action;
use crate::auth::{OptionalAuth, RequireUser};
use crate::server::AppState;
use crate::server::dto::{
    CollectionAttributes, CollectionStats, CreateCollectionRequest, ListCollectionsParams,
    PaginationParams, UpdateCollectionRequest,
};
use crate::server::pipeline::{
    LoadCollection, LoadCollectionAndCategory, Pipeline, RequestContext, RequireAuthenticated,
    ResolveAccess, ValidateAllowedUsers,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::types::{Collection, Privacy, User};
use crate::validation::{validate_collection_name, validate_cover_image, validate_description};

const POPULAR_LIMIT: i32 = 10;

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn check_fields(
    name: &str,
    description: Option<&str>,
    cover_image: Option<&str>,
) -> Result<(), ApiError> {
    let errors: Vec<String> = [
        validate_collection_name(name),
        validate_description(description),
        validate_cover_image(cover_image),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(errors))
    }
}

/// Loads a collection the principal may read.
pub(super) fn readable(
    state: &AppState,
    principal: Option<User>,
    id: String,
) -> Result<Collection, ApiError> {
    Pipeline::new()
        .then(LoadCollection(id))
        .then(ResolveAccess(Action::Read))
        .run(state.store.as_ref(), RequestContext::new(principal))?
        .take_collection()
}

pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCollectionsParams>,
) -> impl IntoResponse {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let collections = state
        .store
        .list_public_collections(params.category.as_deref(), cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list collections")?;

    let (collections, next_cursor, has_more) =
        paginate(collections, DEFAULT_PAGE_SIZE as usize, |c| c.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        collections,
        next_cursor,
        has_more,
    )))
}

pub async fn list_popular_collections(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let collections = state
        .store
        .list_popular_collections(POPULAR_LIMIT)
        .api_err("Failed to list popular collections")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(collections)))
}

pub async fn create_collection(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let name = req.name.trim().to_string();

    check_fields(&name, req.description.as_deref(), req.cover_image.as_deref())?;

    store
        .get_category(&req.category_id)
        .api_err("Failed to get category")?
        .or_not_found("CATEGORY_NOT_FOUND", "Category not found")?;

    let privacy = req.privacy.unwrap_or_default();
    Pipeline::new()
        .then(RequireAuthenticated)
        .then(ValidateAllowedUsers {
            privacy: Some(privacy),
            allowed_users: req.allowed_users.clone(),
        })
        .run(store, RequestContext::new(Some(auth.user.clone())))?;

    let allowed_users = match privacy {
        Privacy::Private => dedup(req.allowed_users.unwrap_or_default()),
        Privacy::Public => Vec::new(),
    };

    let now = Utc::now();
    let collection = Collection {
        id: Uuid::new_v4().to_string(),
        name,
        description: req.description,
        owner_id: auth.user.id,
        category_id: req.category_id,
        privacy,
        allowed_users,
        owner_only_items: req.owner_only_items,
        views: 0,
        cover_image: req.cover_image.filter(|c| !c.is_empty()),
        created_at: now,
        updated_at: now,
    };

    store
        .create_collection(&collection)
        .api_err("Failed to create collection")?;
    tracing::info!(collection = %collection.id, owner = %collection.owner_id, "collection created");

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(collection))))
}

pub async fn get_collection(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let collection = readable(&state, auth.user, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(collection)))
}

pub async fn update_collection(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCollectionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut collection = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadCollection(id))
        .then(ResolveAccess(Action::Write))
        .then(ValidateAllowedUsers {
            privacy: req.privacy,
            allowed_users: req.allowed_users.clone(),
        })
        .run(store, RequestContext::new(Some(auth.user)))?
        .take_collection()?;

    if let Some(name) = req.name {
        collection.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        collection.description = Some(description).filter(|d| !d.trim().is_empty());
    }
    if let Some(cover_image) = req.cover_image {
        collection.cover_image = Some(cover_image).filter(|c| !c.is_empty());
    }
    check_fields(
        &collection.name,
        collection.description.as_deref(),
        collection.cover_image.as_deref(),
    )?;

    if let Some(owner_only_items) = req.owner_only_items {
        collection.owner_only_items = owner_only_items;
    }
    if let Some(privacy) = req.privacy {
        collection.privacy = privacy;
    }
    match collection.privacy {
        Privacy::Public => collection.allowed_users.clear(),
        Privacy::Private => {
            if let Some(allowed_users) = req.allowed_users {
                collection.allowed_users = dedup(allowed_users);
            }
        }
    }
    collection.updated_at = Utc::now();

    store
        .update_collection(&collection)
        .api_err("Failed to update collection")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(collection)))
}

pub async fn delete_collection(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let collection = Pipeline::new()
        .then(RequireAuthenticated)
        .then(LoadCollection(id))
        .then(ResolveAccess(Action::Administer))
        .run(store, RequestContext::new(Some(auth.user)))?
        .take_collection()?;

    store
        .delete_collection(&collection.id)
        .api_err("Failed to delete collection")?;
    tracing::info!(collection = %collection.id, "collection deleted");

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn get_collection_attributes(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut ctx = Pipeline::new()
        .then(LoadCollectionAndCategory(Some(id)))
        .then(ResolveAccess(Action::Read))
        .run(state.store.as_ref(), RequestContext::new(auth.user))?;
    let category = ctx
        .category
        .take()
        .ok_or_else(|| ApiError::internal("Internal server error"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(CollectionAttributes {
        category_id: category.id,
        category_name: category.name,
        attributes: category.attributes,
        require_item_name: category.require_item_name,
        display_attribute_index: category.display_attribute_index,
    })))
}

pub async fn list_collection_items(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let collection = readable(&state, auth.user, id)?;
    let cursor = params.cursor.as_deref().unwrap_or("");

    let items = state
        .store
        .list_collection_items(&collection.id, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list items")?;

    let (items, next_cursor, has_more) =
        paginate(items, DEFAULT_PAGE_SIZE as usize, |i| i.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(items, next_cursor, has_more)))
}

pub async fn get_collection_stats(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let collection = readable(&state, auth.user, id)?;

    let items_count = state
        .store
        .count_collection_items(&collection.id)
        .api_err("Failed to count items")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(CollectionStats {
        items_count,
        views: collection.views,
        created_at: collection.created_at,
    })))
}

pub async fn record_collection_view(
    auth: OptionalAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let collection = readable(&state, auth.user, id)?;

    state
        .store
        .increment_collection_views(&collection.id)
        .api_err("Failed to record view")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
