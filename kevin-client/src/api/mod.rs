mod client;
mod error;

pub use client::{ApiClient, DEFAULT_SERVER_URL};
pub use error::{ApiError, ApiResult};
