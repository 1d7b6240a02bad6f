use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateCategoryRequest, UpdateCategoryRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{AttributeSchema, Category};
use crate::validation::validate_category;

fn trim_schemas(attributes: Vec<AttributeSchema>) -> Vec<AttributeSchema> {
    attributes
        .into_iter()
        .map(|mut a| {
            a.name = a.name.trim().to_string();
            a.options = a.options.into_iter().map(|o| o.trim().to_string()).collect();
            a
        })
        .collect()
}

fn check_name_available(
    store: &dyn Store,
    name: &str,
    except: Option<&str>,
) -> Result<(), ApiError> {
    let existing = store
        .get_category_by_name(name)
        .api_err("Failed to check category name")?;
    match existing {
        Some(c) if Some(c.id.as_str()) != except => Err(ApiError::conflict(
            "CATEGORY_EXISTS",
            "A category with this name already exists",
        )),
        _ => Ok(()),
    }
}

fn map_write_error(e: Error) -> ApiError {
    match e {
        Error::AlreadyExists => {
            ApiError::conflict("CATEGORY_EXISTS", "A category with this name already exists")
        }
        e => {
            tracing::error!("Failed to save category: {e}");
            ApiError::internal("Failed to save category")
        }
    }
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let categories = state
        .store
        .list_categories()
        .api_err("Failed to list categories")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(categories)))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let category = state
        .store
        .get_category(&id)
        .api_err("Failed to get category")?
        .or_not_found("CATEGORY_NOT_FOUND", "Category not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(category)))
}

pub async fn create_category(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCategoryRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let name = req.name.trim().to_string();
    let attributes = trim_schemas(req.attributes);

    validate_category(
        &name,
        req.description.as_deref(),
        &attributes,
        req.display_attribute_index,
    )
    .map_err(ApiError::validation)?;
    check_name_available(store, &name, None)?;

    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name,
        description: req.description,
        attributes,
        require_item_name: req.require_item_name,
        display_attribute_index: req.display_attribute_index,
        created_at: now,
        updated_at: now,
    };

    store.create_category(&category).map_err(map_write_error)?;
    tracing::info!(category = %category.name, "category created");

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

/// Schema edits apply to new writes only. Stored items are reconciled the
/// next time they are updated.
pub async fn update_category(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCategoryRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut category = store
        .get_category(&id)
        .api_err("Failed to get category")?
        .or_not_found("CATEGORY_NOT_FOUND", "Category not found")?;

    if let Some(name) = req.name {
        category.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        category.description = Some(description);
    }
    if let Some(attributes) = req.attributes {
        category.attributes = trim_schemas(attributes);
        // A display index into the old schema is meaningless now.
        category.display_attribute_index = None;
    }
    if let Some(require_item_name) = req.require_item_name {
        category.require_item_name = require_item_name;
    }
    if let Some(index) = req.display_attribute_index {
        category.display_attribute_index = Some(index);
    }

    validate_category(
        &category.name,
        category.description.as_deref(),
        &category.attributes,
        category.display_attribute_index,
    )
    .map_err(ApiError::validation)?;
    check_name_available(store, &category.name, Some(&category.id))?;

    category.updated_at = Utc::now();
    store.update_category(&category).map_err(map_write_error)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(category)))
}

pub async fn delete_category(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let category = store
        .get_category(&id)
        .api_err("Failed to get category")?
        .or_not_found("CATEGORY_NOT_FOUND", "Category not found")?;

    let in_use = store
        .count_category_collections(&category.id)
        .api_err("Failed to count collections")?;
    if in_use > 0 {
        return Err(ApiError::bad_request(
            "CATEGORY_IN_USE",
            format!("Category is used by {in_use} collection(s)"),
        ));
    }

    store
        .delete_category(&category.id)
        .api_err("Failed to delete category")?;
    tracing::info!(category = %category.name, "category deleted");

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
