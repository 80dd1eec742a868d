mod comment_repository;
mod like_repository;
mod post_repository;

pub use comment_repository::CommentRepository;
pub use like_repository::LikeRepository;
pub use post_repository::{NewPost, PostRepository};

use thiserror::Error;
use uuid::Uuid;

/// A client token that was first used for a different post or user
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Token {token} was already used for a different request")]
pub struct TokenConflict {
    pub token: Uuid,
}
