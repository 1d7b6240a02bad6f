mod attribute;
mod models;

pub use attribute::*;
pub use models::*;
