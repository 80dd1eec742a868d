pub mod comments;
pub mod error;
pub mod likes;
pub mod posts;

pub use error::{ApiError, ApiResult};

use kevin_types::{validate_post_id, PostId};

use crate::db::repositories::PostRepository;
use crate::state::AppState;

/// Parse a post id from a path segment
pub(crate) fn parse_post_id(raw: &str) -> ApiResult<PostId> {
    let post_id = raw
        .parse::<PostId>()
        .map_err(|_| ApiError::BadRequest("Invalid post ID".to_string()))?;
    validate_post_id(post_id)?;
    Ok(post_id)
}

/// Fail with 404 unless the post exists
pub(crate) fn ensure_post_exists(state: &AppState, post_id: PostId) -> ApiResult<()> {
    if !PostRepository::new(state.db.pool.clone()).exists(post_id)? {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }
    Ok(())
}
