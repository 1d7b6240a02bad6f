mod allowed_users;
mod categories;
mod collections;
mod items;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Categories (writes are admin-only)
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(categories::get_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        // Collections
        .route(
            "/collections",
            get(collections::list_collections).post(collections::create_collection),
        )
        .route(
            "/collections/popular",
            get(collections::list_popular_collections),
        )
        .route(
            "/collections/{id}",
            get(collections::get_collection)
                .patch(collections::update_collection)
                .delete(collections::delete_collection),
        )
        .route(
            "/collections/{id}/attributes",
            get(collections::get_collection_attributes),
        )
        .route(
            "/collections/{id}/items",
            get(collections::list_collection_items),
        )
        .route(
            "/collections/{id}/stats",
            get(collections::get_collection_stats),
        )
        .route(
            "/collections/{id}/view",
            post(collections::record_collection_view),
        )
        // Allow-list
        .route(
            "/collections/{id}/allowed-users",
            get(allowed_users::list_allowed_users).post(allowed_users::add_allowed_user),
        )
        .route(
            "/collections/{id}/allowed-users/{username}",
            delete(allowed_users::remove_allowed_user),
        )
        // Items
        .route("/items", post(items::create_item))
        .route(
            "/items/{id}",
            get(items::get_item)
                .patch(items::update_item)
                .delete(items::delete_item),
        )
}
