use async_trait::async_trait;
use uuid::Uuid;

use kevin_types::{Comment, PostId, ToggleLikeResponse};

use crate::api::ApiResult;

/// Remote side of an optimistic mutation.
///
/// Implementations must reject malformed input with `ApiError::Validation`
/// before doing any I/O, and must forward the idempotency token so a replayed
/// mutation is applied at most once.
#[async_trait]
pub trait MutationGateway: Send + Sync {
    /// Like the post if the user has not, unlike it otherwise
    async fn toggle_like(
        &self,
        post_id: PostId,
        username: &str,
        token: Uuid,
    ) -> ApiResult<ToggleLikeResponse>;

    async fn add_comment(
        &self,
        post_id: PostId,
        username: &str,
        text: &str,
        token: Uuid,
    ) -> ApiResult<Comment>;

    /// Authoritative comments, oldest first
    async fn fetch_comments(&self, post_id: PostId) -> ApiResult<Vec<Comment>>;

    async fn fetch_likes(&self, post_id: PostId) -> ApiResult<Vec<String>>;
}
