use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use kevin_types::{validate_comment_text, validate_username, Comment, CreateCommentRequest};

use crate::{
    api::{ensure_post_exists, parse_post_id, ApiResult},
    db::repositories::CommentRepository,
    state::AppState,
};

/// GET /posts/:id/comments - Comments on a post, oldest first
pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<Vec<Comment>>> {
    let post_id = parse_post_id(&post_id)?;
    ensure_post_exists(&state, post_id)?;

    let comments = CommentRepository::new(state.db.pool.clone()).list_for_post(post_id)?;
    Ok(Json(comments))
}

/// POST /posts/:id/comments - Add a comment
pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let post_id = parse_post_id(&post_id)?;
    validate_username(&payload.username)?;
    validate_comment_text(&payload.text)?;
    ensure_post_exists(&state, post_id)?;

    let comment = CommentRepository::new(state.db.pool.clone()).create(
        post_id,
        &payload.username,
        &payload.text,
        payload.token,
    )?;

    state.feed_cache.invalidate().await;
    tracing::debug!("{} commented on post {}", payload.username, post_id);

    Ok((StatusCode::CREATED, Json(comment)))
}
