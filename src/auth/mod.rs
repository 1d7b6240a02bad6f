mod helpers;
mod middleware;
mod password;
mod token;

pub use middleware::{OptionalAuth, RequireAdmin, RequireUser};
pub use password::{hash_password, verify_password};
pub use token::{IssuedToken, TokenGenerator, parse_token};
