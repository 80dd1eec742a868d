use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use kevin_types::MAX_IMAGE_BYTES;

use crate::{api, state::AppState, storage::UPLOADS_ROUTE};

/// Room for the non-image form fields and multipart framing
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = ServeDir::new(state.bucket.root());

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Feed and posts
        .route("/posts", get(api::posts::get_feed).post(api::posts::create_post))
        .route("/posts/:id", get(api::posts::get_post))
        // Comments
        .route(
            "/posts/:id/comments",
            get(api::comments::get_comments).post(api::comments::create_comment),
        )
        // Likes
        .route("/posts/:id/likes", get(api::likes::get_likes))
        .route("/posts/:id/like", post(api::likes::toggle_like))
        .nest_service(UPLOADS_ROUTE, uploads)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}
