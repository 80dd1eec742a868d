use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kevin_types::{ErrorKind, ErrorResponse, ValidationError};

use crate::db::repositories::TokenConflict;
use crate::storage::UploadError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Validation(ValidationError),
    Upload(String),
    Storage(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, kind, details) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "Not Found",
                ErrorKind::NotFound,
                Some(msg),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                ErrorKind::Validation,
                Some(msg),
            ),
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                ErrorKind::Validation,
                Some(err.to_string()),
            ),
            ApiError::Upload(msg) => {
                tracing::error!("Upload error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upload Failed",
                    ErrorKind::Upload,
                    Some("Image upload failed".to_string()),
                )
            }
            ApiError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage Error",
                    ErrorKind::Storage,
                    Some("Database operation failed".to_string()),
                )
            }
        };

        let error_response = ErrorResponse {
            error: message.to_string(),
            kind,
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Upload(err.to_string())
    }
}

// Repository failures surface as anyhow errors
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(conflict) = err.downcast_ref::<TokenConflict>() {
            return ApiError::BadRequest(conflict.to_string());
        }
        ApiError::Storage(format!("{:#}", err))
    }
}
