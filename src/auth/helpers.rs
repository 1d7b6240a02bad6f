use chrono::Utc;

use super::{TokenGenerator, parse_token};
use crate::server::AppState;
use crate::types::{Token, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    AccountDisabled,
    InternalError,
}

pub struct ValidatedToken {
    pub token: Token,
    pub user: User,
}

/// Validates a raw bearer token against the store and resolves its user.
pub fn validate_token(
    state: &AppState,
    raw_token: &str,
) -> Result<ValidatedToken, TokenValidationError> {
    let (lookup, _secret) =
        parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let token = state
        .store
        .get_token_by_lookup(&lookup)
        .map_err(|e| {
            tracing::error!("Failed to look up token: {e}");
            TokenValidationError::InternalError
        })?
        .ok_or(TokenValidationError::InvalidToken)?;

    let generator = TokenGenerator::new();
    if !generator
        .verify(raw_token, &token.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    if token.expires_at < Utc::now() {
        return Err(TokenValidationError::TokenExpired);
    }

    let user = state
        .store
        .get_user(&token.user_id)
        .map_err(|e| {
            tracing::error!("Failed to load token owner: {e}");
            TokenValidationError::InternalError
        })?
        .ok_or(TokenValidationError::InvalidToken)?;

    if !user.is_active {
        return Err(TokenValidationError::AccountDisabled);
    }

    if let Err(e) = state.store.update_token_last_used(&token.id) {
        tracing::warn!("Failed to update token last_used_at: {e}");
    }

    Ok(ValidatedToken { token, user })
}

/// Extracts a bearer token from the Authorization header.
/// Returns None if no header is present and Err for any other scheme.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenValidationError> {
    match auth_header {
        Some(header) => header
            .strip_prefix("Bearer ")
            .map(|t| Some(t.trim().to_string()))
            .ok_or(TokenValidationError::InvalidScheme),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc")).unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(extract_token_from_header(None).unwrap(), None);
        assert_eq!(
            extract_token_from_header(Some("Basic abc")).unwrap_err(),
            TokenValidationError::InvalidScheme
        );
    }
}
