use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Token;

const ARGON2_MEMORY: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const TOKEN_PREFIX: &str = "trove";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;

/// A freshly issued session token. `raw` is only ever shown once.
pub struct IssuedToken {
    pub raw: String,
    pub token: Token,
}

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("argon2 params are valid constants");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Generates a new token with the format: trove_<lookup>_<secret>
    /// Returns (raw_token, lookup, hash)
    pub fn generate(&self) -> Result<(String, String, String)> {
        let lookup = generate_lookup();
        let secret = generate_secret();
        let raw_token = format!("{TOKEN_PREFIX}_{lookup}_{secret}");
        let hash = self.hash(&raw_token)?;
        Ok((raw_token, lookup, hash))
    }

    /// Generates a token for `user_id` that expires `ttl_seconds` from now.
    pub fn issue(&self, user_id: &str, ttl_seconds: u64) -> Result<IssuedToken> {
        let (raw, lookup, hash) = self.generate()?;
        let now = Utc::now();
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let expires_at = Duration::try_seconds(ttl)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| Error::Config(format!("token ttl out of range: {ttl_seconds}")))?;

        Ok(IssuedToken {
            raw,
            token: Token {
                id: Uuid::new_v4().to_string(),
                token_hash: hash,
                token_lookup: lookup,
                user_id: user_id.to_string(),
                created_at: now,
                expires_at,
                last_used_at: None,
            },
        })
    }

    pub fn hash(&self, token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| Error::Password(format!("failed to hash token: {e}")))?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, token: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Password(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(token.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Password(format!("failed to verify token: {e}"))),
        }
    }
}

fn generate_lookup() -> String {
    Uuid::new_v4().simple().to_string()[..LOOKUP_LENGTH].to_string()
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Splits a raw token into (lookup, secret).
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH || secret.len() != SECRET_LENGTH || secret.contains('_') {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_configured_params() {
        let generator = TokenGenerator::new();
        let hash = generator.hash("trove_abcdefgh_secret").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=1,p=4$"), "{hash}");
    }

    #[test]
    fn test_token_generation_format() {
        let generator = TokenGenerator::new();
        let (token, lookup, _hash) = generator.generate().unwrap();

        assert!(token.starts_with("trove_"));
        assert_eq!(lookup.len(), 8);

        let parts: Vec<&str> = token.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], lookup);
        assert_eq!(parts[2].len(), 24);
    }

    #[test]
    fn test_token_verification() {
        let generator = TokenGenerator::new();
        let (token, _, hash) = generator.generate().unwrap();

        assert!(generator.verify(&token, &hash).unwrap());

        let wrong = format!("{}xxxxx", &token[..token.len() - 5]);
        assert!(!generator.verify(&wrong, &hash).unwrap());
    }

    #[test]
    fn test_issue_sets_expiry() {
        let generator = TokenGenerator::new();
        let issued = generator.issue("u1", 60).unwrap();

        assert_eq!(issued.token.user_id, "u1");
        assert!(issued.token.expires_at > issued.token.created_at);
        assert!(issued.token.token_hash.starts_with("$argon2id$"));
        let (lookup, _) = parse_token(&issued.raw).unwrap();
        assert_eq!(lookup, issued.token.token_lookup);
    }

    #[test]
    fn test_parse_token_rejects_malformed() {
        assert!(parse_token("trove_12345678_123456789012345678901234").is_ok());
        assert!(parse_token("cutlass_12345678_123456789012345678901234").is_err());
        assert!(parse_token("trove_12345678").is_err());
        assert!(parse_token("trove_1234_123456789012345678901234").is_err());
    }
}
