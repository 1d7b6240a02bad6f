use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::helpers::{TokenValidationError, extract_token_from_header, validate_token};
use crate::server::AppState;
use crate::server::response::ApiError;
use crate::types::{Token, User};

/// Extractor that requires an authenticated, active user.
pub struct RequireUser {
    pub token: Token,
    pub user: User,
}

/// Extractor that requires an authenticated admin.
pub struct RequireAdmin {
    pub token: Token,
    pub user: User,
}

/// Extractor that admits anonymous requests. A credential that is present
/// but invalid is still rejected.
pub struct OptionalAuth {
    pub user: Option<User>,
}

impl From<TokenValidationError> for ApiError {
    fn from(err: TokenValidationError) -> Self {
        match err {
            TokenValidationError::InvalidScheme => {
                ApiError::unauthorized("INVALID_TOKEN", "Invalid authorization scheme")
            }
            TokenValidationError::InvalidToken => {
                ApiError::unauthorized("INVALID_TOKEN", "Invalid token")
            }
            TokenValidationError::TokenExpired => {
                ApiError::unauthorized("TOKEN_EXPIRED", "Token expired")
            }
            TokenValidationError::AccountDisabled => {
                ApiError::forbidden("ACCOUNT_DISABLED", "Account is disabled")
            }
            TokenValidationError::InternalError => ApiError::internal("Internal server error"),
        }
    }
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<(Token, User)>, ApiError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match extract_token_from_header(auth_header)? {
        Some(raw) => {
            let validated = validate_token(state, &raw)?;
            Ok(Some((validated.token, validated.user)))
        }
        None => Ok(None),
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (token, user) = authenticate(parts, state)?
            .ok_or_else(|| ApiError::unauthorized("MISSING_TOKEN", "Authentication required"))?;
        Ok(RequireUser { token, user })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser { token, user } = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::debug!(user = %user.id, "admin route denied");
            return Err(ApiError::forbidden("ADMIN_REQUIRED", "Admin access required"));
        }

        Ok(RequireAdmin { token, user })
    }
}

impl FromRequestParts<Arc<AppState>> for OptionalAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?.map(|(_, user)| user);
        Ok(OptionalAuth { user })
    }
}
