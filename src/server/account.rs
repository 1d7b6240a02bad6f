use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireUser, TokenGenerator, hash_password, verify_password};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::{Role, User};
use crate::validation::{validate_email, validate_password, validate_username};

pub fn account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Issues and stores a session token for `user`.
fn start_session(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let issued = TokenGenerator::new()
        .issue(&user.id, state.config.token_ttl_seconds)
        .api_err("Failed to issue token")?;
    state
        .store
        .create_token(&issued.token)
        .api_err("Failed to store token")?;
    state
        .store
        .record_login(&user.id)
        .api_err("Failed to record login")?;

    tracing::info!(user = %user.username, "session started");

    Ok(AuthResponse {
        token: issued.raw,
        expires_at: issued.token.expires_at,
        user,
    })
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();

    let errors: Vec<String> = [
        validate_username(username),
        validate_email(&email),
        validate_password(&req.password),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let taken = state
        .store
        .get_user_by_username(username)
        .api_err("Failed to check username")?
        .is_some()
        || state
            .store
            .get_user_by_email(&email)
            .api_err("Failed to check email")?
            .is_some();
    if taken {
        return Err(ApiError::conflict(
            "USER_EXISTS",
            "Username or email is already registered",
        ));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        email,
        password_hash: hash_password(&req.password).api_err("Failed to hash password")?,
        role: Role::User,
        is_active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };

    state.store.create_user(&user).map_err(|e| match e {
        Error::AlreadyExists => {
            ApiError::conflict("USER_EXISTS", "Username or email is already registered")
        }
        e => {
            tracing::error!("Failed to create user: {e}");
            ApiError::internal("Failed to create user")
        }
    })?;

    let session = start_session(&state, user)?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(session))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let invalid = || ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid username or password");
    let identifier = req.username.trim();

    let found = if identifier.contains('@') {
        state
            .store
            .get_user_by_email(&identifier.to_lowercase())
            .api_err("Failed to look up user")?
    } else {
        state
            .store
            .get_user_by_username(identifier)
            .api_err("Failed to look up user")?
    };
    let user = found.ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash).api_err("Failed to verify password")? {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(ApiError::forbidden("ACCOUNT_DISABLED", "Account is disabled"));
    }

    let session = start_session(&state, user)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(session)))
}

pub async fn logout(auth: RequireUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state
        .store
        .delete_token(&auth.token.id)
        .api_err("Failed to delete token")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn me(auth: RequireUser) -> impl IntoResponse {
    Json(ApiResponse::success(auth.user))
}
