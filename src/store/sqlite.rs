use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, last_login_at, created_at, updated_at";
const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";
const CATEGORY_COLUMNS: &str = "id, name, description, attributes, require_item_name, \
     display_attribute_index, created_at, updated_at";
const COLLECTION_COLUMNS: &str = "id, name, description, owner_id, category_id, privacy, \
     owner_only_items, views, cover_image, created_at, updated_at";
const ITEM_COLUMNS: &str =
    "id, collection_id, name, description, attributes, images, created_by, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') default: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Maps unique and primary key violations to `AlreadyExists`.
fn map_unique(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Error::AlreadyExists
        }
        _ => Error::from(err),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::parse(&row.get::<_, String>(4)?).unwrap_or_default(),
        is_active: row.get(5)?,
        last_login_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: parse_datetime(&row.get::<_, String>(5)?),
        last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        attributes: json_column(row, 3)?,
        require_item_name: row.get(4)?,
        display_attribute_index: row
            .get::<_, Option<i64>>(5)?
            .and_then(|i| usize::try_from(i).ok()),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// The allow-list is loaded separately; see [`fill_allowed_users`].
fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
        category_id: row.get(4)?,
        privacy: Privacy::parse(&row.get::<_, String>(5)?).unwrap_or_default(),
        allowed_users: Vec::new(),
        owner_only_items: row.get(6)?,
        views: row.get(7)?,
        cover_image: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        attributes: json_column(row, 4)?,
        images: json_column(row, 5)?,
        created_by: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn fill_allowed_users(conn: &Connection, collection: &mut Collection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM collection_allowed_users
         WHERE collection_id = ?1 ORDER BY created_at, user_id",
    )?;
    collection.allowed_users = stmt
        .query_map(params![collection.id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(())
}

fn collect_collections(
    conn: &Connection,
    rows: Vec<Collection>,
) -> Result<Vec<Collection>> {
    rows.into_iter()
        .map(|mut c| {
            fill_allowed_users(conn, &mut c)?;
            Ok(c)
        })
        .collect()
}

fn display_index(category: &Category) -> Option<i64> {
    category
        .display_attribute_index
        .and_then(|i| i64::try_from(i).ok())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.is_active,
                    user.last_login_at.as_ref().map(format_datetime),
                    format_datetime(&user.created_at),
                    format_datetime(&user.updated_at),
                ],
            )
            .map_err(map_unique)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx
            .execute(
                "UPDATE users SET username = ?1, email = ?2, password_hash = ?3, role = ?4,
                 is_active = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.is_active,
                    format_datetime(&user.updated_at),
                    user.id,
                ],
            )
            .map_err(map_unique)?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        // Allow-lists only ever name active users.
        if !user.is_active {
            tx.execute(
                "DELETE FROM collection_allowed_users WHERE user_id = ?1",
                params![user.id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn record_login(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_admin(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            &format!("INSERT INTO tokens ({TOKEN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                format_datetime(&token.expires_at),
                token.last_used_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Category operations

    fn create_category(&self, category: &Category) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO categories ({CATEGORY_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    category.id,
                    category.name,
                    category.description,
                    serde_json::to_string(&category.attributes)?,
                    category.require_item_name,
                    display_index(category),
                    format_datetime(&category.created_at),
                    format_datetime(&category.updated_at),
                ],
            )
            .map_err(map_unique)?;
        Ok(())
    }

    fn get_category(&self, id: &str) -> Result<Option<Category>> {
        self.conn()
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id],
                category_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.conn()
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1"),
                params![name],
                category_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name COLLATE NOCASE"
        ))?;
        let rows = stmt.query_map([], category_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_category(&self, category: &Category) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE categories SET name = ?1, description = ?2, attributes = ?3,
                 require_item_name = ?4, display_attribute_index = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    category.name,
                    category.description,
                    serde_json::to_string(&category.attributes)?,
                    category.require_item_name,
                    display_index(category),
                    format_datetime(&category.updated_at),
                    category.id,
                ],
            )
            .map_err(map_unique)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_category(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn count_category_collections(&self, id: &str) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM collections WHERE category_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Collection operations

    fn create_collection(&self, collection: &Collection) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO collections ({COLLECTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                collection.id,
                collection.name,
                collection.description,
                collection.owner_id,
                collection.category_id,
                collection.privacy.as_str(),
                collection.owner_only_items,
                collection.views,
                collection.cover_image,
                format_datetime(&collection.created_at),
                format_datetime(&collection.updated_at),
            ],
        )
        .map_err(map_unique)?;
        for user_id in &collection.allowed_users {
            tx.execute(
                "INSERT OR IGNORE INTO collection_allowed_users (collection_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![collection.id, user_id, format_datetime(&collection.created_at)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let conn = self.conn();
        let found = conn
            .query_row(
                &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1"),
                params![id],
                collection_from_row,
            )
            .optional()?;

        match found {
            Some(mut collection) => {
                fill_allowed_users(&conn, &mut collection)?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    fn list_public_collections(
        &self,
        category_id: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Collection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections
             WHERE privacy = 'public' AND id > ?1 AND (?2 IS NULL OR category_id = ?2)
             ORDER BY id LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![cursor, category_id, limit], collection_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        collect_collections(&conn, rows)
    }

    fn list_popular_collections(&self, limit: i32) -> Result<Vec<Collection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections
             WHERE privacy = 'public' ORDER BY views DESC, created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], collection_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        collect_collections(&conn, rows)
    }

    fn update_collection(&self, collection: &Collection) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE collections SET name = ?1, description = ?2, category_id = ?3, privacy = ?4,
             owner_only_items = ?5, cover_image = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                collection.name,
                collection.description,
                collection.category_id,
                collection.privacy.as_str(),
                collection.owner_only_items,
                collection.cover_image,
                format_datetime(&collection.updated_at),
                collection.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.execute(
            "DELETE FROM collection_allowed_users WHERE collection_id = ?1",
            params![collection.id],
        )?;
        for user_id in &collection.allowed_users {
            tx.execute(
                "INSERT OR IGNORE INTO collection_allowed_users (collection_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![collection.id, user_id, format_datetime(&collection.updated_at)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_collection(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn increment_collection_views(&self, id: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE collections SET views = views + 1 WHERE id = ?1",
            params![id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Allow-list operations

    fn add_allowed_user(&self, collection_id: &str, user_id: &str) -> Result<()> {
        let now = format_datetime(&Utc::now());
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE collections SET privacy = 'private', updated_at = ?1 WHERE id = ?2",
            params![now, collection_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        tx.execute(
            "INSERT OR IGNORE INTO collection_allowed_users (collection_id, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![collection_id, user_id, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_allowed_user(&self, collection_id: &str, user_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM collection_allowed_users WHERE collection_id = ?1 AND user_id = ?2",
            params![collection_id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn list_allowed_users(&self, collection_id: &str) -> Result<Vec<UserSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username FROM collection_allowed_users a
             JOIN users u ON u.id = a.user_id
             WHERE a.collection_id = ?1
             ORDER BY a.created_at, u.id",
        )?;
        let rows = stmt.query_map(params![collection_id], |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Item operations

    fn create_item(&self, item: &Item) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO items ({ITEM_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    item.id,
                    item.collection_id,
                    item.name,
                    item.description,
                    serde_json::to_string(&item.attributes)?,
                    serde_json::to_string(&item.images)?,
                    item.created_by,
                    format_datetime(&item.created_at),
                    format_datetime(&item.updated_at),
                ],
            )
            .map_err(map_unique)?;
        Ok(())
    }

    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        self.conn()
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_collection_items(
        &self,
        collection_id: &str,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Item>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE collection_id = ?1 AND id > ?2 ORDER BY id LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![collection_id, cursor, limit], item_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_collection_items(&self, collection_id: &str) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM items WHERE collection_id = ?1",
            params![collection_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_item(&self, item: &Item) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE items SET name = ?1, description = ?2, attributes = ?3, images = ?4,
             updated_at = ?5 WHERE id = ?6",
            params![
                item.name,
                item.description,
                serde_json::to_string(&item.attributes)?,
                serde_json::to_string(&item.images)?,
                format_datetime(&item.updated_at),
                item.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_item(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn user(id: &str, username: &str) -> User {
        User {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
            role: Role::User,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            attributes: vec![
                AttributeSchema {
                    name: "isbn".to_string(),
                    kind: AttributeKind::Text,
                    required: true,
                    options: Vec::new(),
                },
                AttributeSchema {
                    name: "format".to_string(),
                    kind: AttributeKind::Select,
                    required: false,
                    options: vec!["hardcover".to_string(), "paperback".to_string()],
                },
            ],
            require_item_name: true,
            display_attribute_index: Some(0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn collection(id: &str, owner: &str, category: &str) -> Collection {
        Collection {
            id: id.to_string(),
            name: "Shelf".to_string(),
            description: None,
            owner_id: owner.to_string(),
            category_id: category.to_string(),
            privacy: Privacy::Public,
            allowed_users: Vec::new(),
            owner_only_items: false,
            views: 0,
            cover_image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: &str, collection: &str, creator: &str) -> Item {
        let mut attributes = AttributeMap::new();
        attributes.insert("zeta".to_string(), AttributeValue::Text("last".to_string()));
        attributes.insert("alpha".to_string(), AttributeValue::Number(1.0));
        Item {
            id: id.to_string(),
            collection_id: collection.to_string(),
            name: "Dune".to_string(),
            description: None,
            attributes,
            images: vec!["https://example.com/a.png".to_string()],
            created_by: creator.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "tokens",
            "categories",
            "collections",
            "collection_allowed_users",
            "items",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_user_crud() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();

        let fetched = store.get_user_by_username("ALICE").unwrap().unwrap();
        assert_eq!(fetched.id, "u1");
        assert_eq!(fetched.role, Role::User);

        let dup = store.create_user(&user("u2", "Alice"));
        assert!(matches!(dup, Err(Error::AlreadyExists)));

        let mut admin = fetched;
        admin.role = Role::Admin;
        store.update_user(&admin).unwrap();
        assert!(store.has_admin().unwrap());
    }

    #[test]
    fn test_token_lookup_collision() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();

        let token = |id: &str| Token {
            id: id.to_string(),
            token_hash: "hash".to_string(),
            token_lookup: "lookup12".to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            last_used_at: None,
        };
        store.create_token(&token("t1")).unwrap();

        let result = store.create_token(&token("t2"));
        assert!(matches!(result, Err(Error::TokenLookupCollision)));
    }

    #[test]
    fn test_category_schema_round_trip() {
        let (_temp, store) = store();
        store.create_category(&category("c1", "Books")).unwrap();

        let fetched = store.get_category_by_name("books").unwrap().unwrap();
        assert_eq!(fetched.attributes, category("c1", "Books").attributes);
        assert_eq!(fetched.display_attribute_index, Some(0));

        let dup = store.create_category(&category("c2", "BOOKS"));
        assert!(matches!(dup, Err(Error::AlreadyExists)));
    }

    #[test]
    fn test_collection_allow_list_replaced() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_user(&user("u2", "bob")).unwrap();
        store.create_user(&user("u3", "carol")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();

        let mut col = collection("col1", "u1", "c1");
        col.privacy = Privacy::Private;
        col.allowed_users = vec!["u2".to_string()];
        store.create_collection(&col).unwrap();

        col.allowed_users = vec!["u3".to_string()];
        store.update_collection(&col).unwrap();

        let fetched = store.get_collection("col1").unwrap().unwrap();
        assert_eq!(fetched.allowed_users, vec!["u3".to_string()]);
        assert_eq!(fetched.privacy, Privacy::Private);
    }

    #[test]
    fn test_add_allowed_user_makes_private() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_user(&user("u2", "bob")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();
        store
            .create_collection(&collection("col1", "u1", "c1"))
            .unwrap();

        store.add_allowed_user("col1", "u2").unwrap();
        store.add_allowed_user("col1", "u2").unwrap();

        let fetched = store.get_collection("col1").unwrap().unwrap();
        assert_eq!(fetched.privacy, Privacy::Private);
        assert_eq!(fetched.allowed_users, vec!["u2".to_string()]);

        let listed = store.list_allowed_users("col1").unwrap();
        assert_eq!(listed[0].username, "bob");

        assert!(store.remove_allowed_user("col1", "u2").unwrap());
        assert!(!store.remove_allowed_user("col1", "u2").unwrap());
    }

    #[test]
    fn test_deactivation_clears_allow_lists() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_user(&user("u2", "bob")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();
        store
            .create_collection(&collection("col1", "u1", "c1"))
            .unwrap();
        store.add_allowed_user("col1", "u2").unwrap();

        let mut bob = store.get_user("u2").unwrap().unwrap();
        bob.role = Role::Admin;
        store.update_user(&bob).unwrap();
        assert_eq!(store.list_allowed_users("col1").unwrap().len(), 1);

        bob.is_active = false;
        store.update_user(&bob).unwrap();
        let fetched = store.get_collection("col1").unwrap().unwrap();
        assert!(fetched.allowed_users.is_empty());
        assert_eq!(fetched.privacy, Privacy::Private);
    }

    #[test]
    fn test_item_attributes_keep_order() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();
        store
            .create_collection(&collection("col1", "u1", "c1"))
            .unwrap();
        store.create_item(&item("i1", "col1", "u1")).unwrap();

        let fetched = store.get_item("i1").unwrap().unwrap();
        let keys: Vec<&str> = fetched.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(fetched.images.len(), 1);
    }

    #[test]
    fn test_collection_delete_cascades_items() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();
        store
            .create_collection(&collection("col1", "u1", "c1"))
            .unwrap();
        store.create_item(&item("i1", "col1", "u1")).unwrap();
        store.create_item(&item("i2", "col1", "u1")).unwrap();
        assert_eq!(store.count_collection_items("col1").unwrap(), 2);

        assert!(store.delete_collection("col1").unwrap());
        assert!(store.get_item("i1").unwrap().is_none());
        assert_eq!(store.count_collection_items("col1").unwrap(), 0);
    }

    #[test]
    fn test_category_in_use_cannot_be_deleted() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();
        store
            .create_collection(&collection("col1", "u1", "c1"))
            .unwrap();

        assert_eq!(store.count_category_collections("c1").unwrap(), 1);
        assert!(store.delete_category("c1").is_err());
    }

    #[test]
    fn test_popular_excludes_private() {
        let (_temp, store) = store();
        store.create_user(&user("u1", "alice")).unwrap();
        store.create_category(&category("c1", "Books")).unwrap();
        store
            .create_collection(&collection("a", "u1", "c1"))
            .unwrap();
        let mut hidden = collection("b", "u1", "c1");
        hidden.privacy = Privacy::Private;
        store.create_collection(&hidden).unwrap();
        store.increment_collection_views("b").unwrap();

        let popular = store.list_popular_collections(10).unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].id, "a");
    }
}
