use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::echo::MutationGateway;
use kevin_types::*;

/// Server used when nothing else is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// API client for communicating with the Kevin server
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Helper to handle API responses
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        // Structured error from our own server
        if let Ok(body) = serde_json::from_str::<ErrorResponse>(&error_text) {
            let message = body.details.unwrap_or(body.error);
            return Err(ApiError::from_server(body.kind, message));
        }

        // Clean up HTML error messages (e.g., from a proxy 404 page)
        let clean_error = if error_text.contains("<html>") || error_text.contains("<!DOCTYPE") {
            format!("Server returned {} error. Please check the server URL.", status.as_u16())
        } else {
            error_text
        };

        match status.as_u16() {
            404 => Err(ApiError::NotFound(clean_error)),
            _ => Err(ApiError::Api(clean_error)),
        }
    }

    /// Liveness probe
    pub async fn health(&self) -> ApiResult<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    // Feed endpoints

    /// Get every post, newest first, with comments and likes
    pub async fn get_feed(&self) -> ApiResult<Vec<FeedPost>> {
        let url = format!("{}/posts", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Get a single post by ID
    pub async fn get_post(&self, post_id: PostId) -> ApiResult<FeedPost> {
        validate_post_id(post_id)?;
        let url = format!("{}/posts/{}", self.base_url, post_id);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Publish a sighting. Only offered to the Kevin role by the CLI.
    pub async fn create_post(
        &self,
        file_name: String,
        image: Vec<u8>,
        caption: Option<String>,
        latitude: f64,
        longitude: f64,
    ) -> ApiResult<CreatePostResponse> {
        validate_image_size(image.len())?;
        validate_caption(caption.as_deref())?;
        validate_coordinates(latitude, longitude)?;

        let mut form = multipart::Form::new()
            .part("image", multipart::Part::bytes(image).file_name(file_name))
            .text("latitude", latitude.to_string())
            .text("longitude", longitude.to_string());
        if let Some(caption) = caption {
            form = form.text("comment", caption);
        }

        let url = format!("{}/posts", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;
        self.handle_response(response).await
    }

    // Comment endpoints

    pub async fn get_comments(&self, post_id: PostId) -> ApiResult<Vec<Comment>> {
        validate_post_id(post_id)?;
        let url = format!("{}/posts/{}/comments", self.base_url, post_id);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    pub async fn add_comment(
        &self,
        post_id: PostId,
        username: &str,
        text: &str,
        token: Option<Uuid>,
    ) -> ApiResult<Comment> {
        validate_post_id(post_id)?;
        validate_username(username)?;
        validate_comment_text(text)?;

        let url = format!("{}/posts/{}/comments", self.base_url, post_id);
        let request = CreateCommentRequest {
            username: username.to_string(),
            text: text.to_string(),
            token,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    // Like endpoints

    pub async fn get_likes(&self, post_id: PostId) -> ApiResult<Vec<String>> {
        validate_post_id(post_id)?;
        let url = format!("{}/posts/{}/likes", self.base_url, post_id);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    pub async fn toggle_like(
        &self,
        post_id: PostId,
        username: &str,
        token: Option<Uuid>,
    ) -> ApiResult<ToggleLikeResponse> {
        validate_post_id(post_id)?;
        validate_username(username)?;

        let url = format!("{}/posts/{}/like", self.base_url, post_id);
        let request = ToggleLikeRequest {
            username: username.to_string(),
            token,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }
}

#[async_trait]
impl MutationGateway for ApiClient {
    async fn toggle_like(
        &self,
        post_id: PostId,
        username: &str,
        token: Uuid,
    ) -> ApiResult<ToggleLikeResponse> {
        ApiClient::toggle_like(self, post_id, username, Some(token)).await
    }

    async fn add_comment(
        &self,
        post_id: PostId,
        username: &str,
        text: &str,
        token: Uuid,
    ) -> ApiResult<Comment> {
        ApiClient::add_comment(self, post_id, username, text, Some(token)).await
    }

    async fn fetch_comments(&self, post_id: PostId) -> ApiResult<Vec<Comment>> {
        self.get_comments(post_id).await
    }

    async fn fetch_likes(&self, post_id: PostId) -> ApiResult<Vec<String>> {
        self.get_likes(post_id).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        let base_url =
            std::env::var("KEVIN_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::new(base_url)
    }
}
