#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use trove::config::ServerConfig;
use trove::server::{AppState, create_router};
use trove::store::{SqliteStore, Store};
use trove::types::Role;

pub const PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    router: Router,
}

/// A registered user and their session token.
pub struct Session {
    pub id: String,
    pub username: String,
    pub token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }

    pub fn details(&self) -> Vec<String> {
        self.body["details"]
            .as_array()
            .map(|d| {
                d.iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn id(&self) -> String {
        self.body["data"]["id"]
            .as_str()
            .expect("response has data.id")
            .to_string()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState::new(store.clone(), config));
        Self {
            temp_dir,
            store,
            router: create_router(state),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, username: &str) -> Session {
        let resp = self
            .post(
                "/api/v1/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register {username}: {:?}", resp.body);

        Session {
            id: resp.body["data"]["user"]["id"]
                .as_str()
                .expect("user id")
                .to_string(),
            username: username.to_string(),
            token: resp.body["data"]["token"]
                .as_str()
                .expect("token")
                .to_string(),
        }
    }

    /// Registers a user and promotes them directly in the store.
    pub async fn register_admin(&self, username: &str) -> Session {
        let session = self.register(username).await;
        let mut user = self
            .store
            .get_user(&session.id)
            .expect("get user")
            .expect("user exists");
        user.role = Role::Admin;
        self.store.update_user(&user).expect("promote user");
        session
    }

    /// Creates a category as `admin` and returns its id.
    pub async fn create_category(&self, admin: &Session, body: Value) -> String {
        let resp = self
            .post("/api/v1/categories", Some(&admin.token), body)
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create category: {:?}", resp.body);
        resp.id()
    }

    /// Creates a collection as `owner` and returns its id.
    pub async fn create_collection(&self, owner: &Session, body: Value) -> String {
        let resp = self
            .post("/api/v1/collections", Some(&owner.token), body)
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create collection: {:?}", resp.body);
        resp.id()
    }
}
