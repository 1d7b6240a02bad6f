use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttributeSchema, Privacy, Role, User};

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}

// Account

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// `username` may also be the account's email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// Categories

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default = "default_true")]
    pub require_item_name: bool,
    #[serde(default)]
    pub display_attribute_index: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Option<Vec<AttributeSchema>>,
    #[serde(default)]
    pub require_item_name: Option<bool>,
    #[serde(default)]
    pub display_attribute_index: Option<usize>,
}

// Collections

#[derive(Debug, Default, Deserialize)]
pub struct ListCollectionsParams {
    #[serde(default)]
    pub cursor: Option<String>,
    /// Category id to filter by.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
    pub category_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Option<Privacy>,
    #[serde(default)]
    pub allowed_users: Option<Vec<String>>,
    #[serde(default)]
    pub owner_only_items: bool,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCollectionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Option<Privacy>,
    #[serde(default)]
    pub allowed_users: Option<Vec<String>>,
    #[serde(default)]
    pub owner_only_items: Option<bool>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddAllowedUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionStats {
    pub items_count: i64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CollectionAttributes {
    pub category_id: String,
    pub category_name: String,
    pub attributes: Vec<AttributeSchema>,
    pub require_item_name: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_attribute_index: Option<usize>,
}
