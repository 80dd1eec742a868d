use axum::{
    extract::{Path, State},
    Json,
};

use kevin_types::{validate_username, ToggleLikeRequest, ToggleLikeResponse};

use crate::{
    api::{ensure_post_exists, parse_post_id, ApiResult},
    db::repositories::LikeRepository,
    state::AppState,
};

/// GET /posts/:id/likes - Usernames that like a post
pub async fn get_likes(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    let post_id = parse_post_id(&post_id)?;
    ensure_post_exists(&state, post_id)?;

    let likes = LikeRepository::new(state.db.pool.clone()).usernames_for_post(post_id)?;
    Ok(Json(likes))
}

/// POST /posts/:id/like - Like the post if the user has not, unlike it otherwise
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(payload): Json<ToggleLikeRequest>,
) -> ApiResult<Json<ToggleLikeResponse>> {
    let post_id = parse_post_id(&post_id)?;
    validate_username(&payload.username)?;
    ensure_post_exists(&state, post_id)?;

    let like_repo = LikeRepository::new(state.db.pool.clone());
    let liked = like_repo.toggle(post_id, &payload.username, payload.token)?;
    let likes = like_repo.usernames_for_post(post_id)?;

    state.feed_cache.invalidate().await;
    tracing::debug!(
        "{} {} post {}",
        payload.username,
        if liked { "liked" } else { "unliked" },
        post_id
    );

    Ok(Json(ToggleLikeResponse {
        post_id,
        username: payload.username,
        liked,
        likes,
    }))
}
