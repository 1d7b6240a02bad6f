mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", patch(users::update_user))
}
