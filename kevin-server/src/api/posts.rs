use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use kevin_types::{
    validate_caption, validate_coordinates, validate_image_size, CreatePostResponse, FeedPost,
    ValidationError,
};

use crate::{
    api::{parse_post_id, ApiError, ApiResult},
    db::repositories::{NewPost, PostRepository},
    feed::{load_feed, load_feed_post},
    state::AppState,
};

/// GET /posts - The feed, newest sighting first
pub async fn get_feed(State(state): State<AppState>) -> ApiResult<Json<Vec<FeedPost>>> {
    if let Some(feed) = state.feed_cache.get().await {
        return Ok(Json(feed.as_ref().clone()));
    }

    let generation = state.feed_cache.generation();
    let feed = Arc::new(load_feed(&state.db.pool)?);
    if !state.feed_cache.store(generation, feed.clone()).await {
        tracing::debug!("Feed changed while loading, not caching this copy");
    }

    Ok(Json(feed.as_ref().clone()))
}

/// GET /posts/:id - One post with its comments and likes
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<FeedPost>> {
    let post_id = parse_post_id(&post_id)?;

    let post = load_feed_post(&state.db.pool, post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// Raw multipart fields of a new sighting
#[derive(Default)]
struct PostForm {
    image: Option<(Option<String>, Bytes)>,
    comment: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

/// A sighting that passed validation and is ready to upload
struct ValidatedPost {
    file_name: Option<String>,
    image: Bytes,
    comment: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl PostForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = PostForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let malformed = |e: axum::extract::multipart::MultipartError| {
                ApiError::BadRequest(format!("Malformed form field '{}': {}", name, e))
            };

            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().map(String::from);
                    let data = field.bytes().await.map_err(malformed)?;
                    form.image = Some((file_name, data));
                }
                "comment" => form.comment = Some(field.text().await.map_err(malformed)?),
                "latitude" => form.latitude = Some(field.text().await.map_err(malformed)?),
                "longitude" => form.longitude = Some(field.text().await.map_err(malformed)?),
                _ => tracing::debug!("Ignoring unknown form field '{}'", name),
            }
        }

        Ok(form)
    }

    fn validate(self) -> Result<ValidatedPost, ValidationError> {
        let (file_name, image) = self
            .image
            .ok_or_else(|| ValidationError::new("image", "An image is required"))?;
        validate_image_size(image.len())?;

        // An empty caption is stored as no caption
        let comment = self.comment.filter(|c| !c.trim().is_empty());
        validate_caption(comment.as_deref())?;

        let latitude = parse_coordinate("latitude", self.latitude)?;
        let longitude = parse_coordinate("longitude", self.longitude)?;
        validate_coordinates(latitude, longitude)?;

        Ok(ValidatedPost {
            file_name,
            image,
            comment,
            latitude,
            longitude,
        })
    }
}

fn parse_coordinate(field: &'static str, raw: Option<String>) -> Result<f64, ValidationError> {
    let raw = raw
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ValidationError::new(field, "A location is required"))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::new(field, "Must be a number"))
}

/// POST /posts - Kevin publishes a new sighting (multipart form)
pub async fn create_post(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreatePostResponse>)> {
    let draft = PostForm::read(multipart).await?.validate()?;

    let image_url = state
        .bucket
        .upload(draft.file_name.as_deref(), &draft.image)
        .await?;

    let created = PostRepository::new(state.db.pool.clone()).create(&NewPost {
        image_url: image_url.clone(),
        comment: draft.comment,
        latitude: draft.latitude,
        longitude: draft.longitude,
    });
    let post = match created {
        Ok(post) => post,
        Err(err) => {
            // The row never made it, so the object would be unreachable
            if let Err(e) = state.bucket.remove(&image_url).await {
                tracing::warn!("Failed to remove orphaned upload {}: {}", image_url, e);
            }
            return Err(err.into());
        }
    };

    state.feed_cache.invalidate().await;
    tracing::info!("New sighting {} at ({}, {})", post.id, post.latitude, post.longitude);

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            post,
            message: "New sighting recorded!".to_string(),
        }),
    ))
}
