mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    /// Deactivating a user also removes them from every allow-list.
    fn update_user(&self, user: &User) -> Result<()>;
    fn record_login(&self, id: &str) -> Result<()>;
    fn has_admin(&self) -> Result<bool>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Category operations
    fn create_category(&self, category: &Category) -> Result<()>;
    fn get_category(&self, id: &str) -> Result<Option<Category>>;
    fn get_category_by_name(&self, name: &str) -> Result<Option<Category>>;
    fn list_categories(&self) -> Result<Vec<Category>>;
    fn update_category(&self, category: &Category) -> Result<()>;
    fn delete_category(&self, id: &str) -> Result<bool>;
    fn count_category_collections(&self, id: &str) -> Result<i64>;

    // Collection operations
    fn create_collection(&self, collection: &Collection) -> Result<()>;
    fn get_collection(&self, id: &str) -> Result<Option<Collection>>;
    fn list_public_collections(
        &self,
        category_id: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Collection>>;
    fn list_popular_collections(&self, limit: i32) -> Result<Vec<Collection>>;
    /// Writes scalar fields and replaces the allow-list in one transaction.
    fn update_collection(&self, collection: &Collection) -> Result<()>;
    fn delete_collection(&self, id: &str) -> Result<bool>;
    fn increment_collection_views(&self, id: &str) -> Result<()>;

    // Allow-list operations
    /// Grants read access and marks the collection private.
    fn add_allowed_user(&self, collection_id: &str, user_id: &str) -> Result<()>;
    fn remove_allowed_user(&self, collection_id: &str, user_id: &str) -> Result<bool>;
    fn list_allowed_users(&self, collection_id: &str) -> Result<Vec<UserSummary>>;

    // Item operations
    fn create_item(&self, item: &Item) -> Result<()>;
    fn get_item(&self, id: &str) -> Result<Option<Item>>;
    fn list_collection_items(
        &self,
        collection_id: &str,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Item>>;
    fn count_collection_items(&self, collection_id: &str) -> Result<i64>;
    fn update_item(&self, item: &Item) -> Result<()>;
    fn delete_item(&self, id: &str) -> Result<bool>;
}
