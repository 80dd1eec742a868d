//! Field rules shared by the server handlers and the client gateway.
//!
//! Every check returns a [`ValidationError`] naming the offending field so the
//! caller can report it next to that field.

use thiserror::Error;

use crate::models::PostId;

/// Maximum length, in characters, of a comment or a post caption.
pub const MAX_TEXT_CHARS: usize = 500;
pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 20;
/// Largest image accepted for a new post.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub fn validate_post_id(post_id: PostId) -> ValidationResult<()> {
    if post_id <= 0 {
        return Err(ValidationError::new("post_id", "Invalid post ID"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> ValidationResult<()> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("username", "Username is required"));
    }
    if trimmed.len() != username.len() {
        return Err(ValidationError::new(
            "username",
            "Username cannot start or end with whitespace",
        ));
    }
    if username.chars().any(char::is_control) {
        return Err(ValidationError::new(
            "username",
            "Username contains invalid characters",
        ));
    }

    let len = username.chars().count();
    if len < MIN_USERNAME_CHARS {
        return Err(ValidationError::new(
            "username",
            format!("Username must be at least {} characters", MIN_USERNAME_CHARS),
        ));
    }
    if len > MAX_USERNAME_CHARS {
        return Err(ValidationError::new(
            "username",
            format!("Username must be at most {} characters", MAX_USERNAME_CHARS),
        ));
    }
    Ok(())
}

pub fn validate_comment_text(text: &str) -> ValidationResult<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::new("text", "Comment cannot be empty"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ValidationError::new("text", "Comment is too long"));
    }
    Ok(())
}

/// Captions are optional; only the length is checked.
pub fn validate_caption(caption: Option<&str>) -> ValidationResult<()> {
    if let Some(caption) = caption {
        if caption.chars().count() > MAX_TEXT_CHARS {
            return Err(ValidationError::new("comment", "Caption is too long"));
        }
    }
    Ok(())
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> ValidationResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::new(
            "latitude",
            "Latitude must be between -90 and 90",
        ));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::new(
            "longitude",
            "Longitude must be between -180 and 180",
        ));
    }
    Ok(())
}

pub fn validate_image_size(len: usize) -> ValidationResult<()> {
    if len == 0 {
        return Err(ValidationError::new("image", "An image is required"));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(ValidationError::new("image", "Image must be smaller than 5 MB"));
    }
    Ok(())
}
