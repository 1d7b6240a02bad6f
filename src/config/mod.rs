mod server;

pub use server::{DEFAULT_TOKEN_TTL_SECONDS, ServerConfig};
