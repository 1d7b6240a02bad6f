//! # Trove
//!
//! A server for user-defined collections whose items follow runtime-defined
//! attribute schemas. Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! trove = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trove::config::ServerConfig;
//! use trove::server::{AppState, create_router};
//! use trove::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `trove` binary. Disable with `default-features = false`.

pub mod access;
pub mod attributes;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod types;
pub mod validation;
