use kevin_types::{ErrorKind, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid {0}")]
    Validation(#[from] ValidationError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),
}

impl ApiError {
    /// Taxonomy bucket shown to the user and recorded in the outbox
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Upload(_) => ErrorKind::Upload,
            ApiError::Storage(_) => ErrorKind::Storage,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Network(_) | ApiError::Serialization(_) | ApiError::Api(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// Rebuild a typed error from a server error body
    pub(crate) fn from_server(kind: ErrorKind, message: String) -> Self {
        match kind {
            // Field detail is already folded into the message
            ErrorKind::Validation => ApiError::Validation(ValidationError::new("request", message)),
            ErrorKind::Upload => ApiError::Upload(message),
            ErrorKind::Storage => ApiError::Storage(message),
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::Unknown => ApiError::Api(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
