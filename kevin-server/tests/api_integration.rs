use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use kevin_server::{build_router, db::Database, storage::ContentBucket, AppState};
use kevin_types::{Comment, CreatePostResponse, ErrorKind, ErrorResponse, FeedPost, ToggleLikeResponse};

/// Router over a seeded in-memory database and a throwaway upload directory
fn test_app() -> (Router, TempDir) {
    let uploads = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    db.initialize().unwrap();
    db.seed_demo_data().unwrap();
    let bucket = ContentBucket::new(uploads.path(), "http://kevin.test").unwrap();
    (build_router(AppState::new(db, bucket)), uploads)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::body::Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

async fn get_json<T: DeserializeOwned>(app: &Router, uri: &str) -> (StatusCode, T) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json<T: DeserializeOwned>(
    app: &Router,
    uri: &str,
    payload: serde_json::Value,
) -> (StatusCode, T) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _uploads) = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_feed_is_newest_first_with_comments_and_likes() {
    let (app, _uploads) = test_app();
    let (status, feed): (_, Vec<FeedPost>) = get_json(&app, "/posts").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = feed.iter().map(|p| p.post.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let first = feed.iter().find(|p| p.post.id == 1).unwrap();
    let commenters: Vec<_> = first.comments.iter().map(|c| c.username.as_str()).collect();
    assert_eq!(commenters, vec!["ana", "luis"]);
    assert_eq!(first.like_count(), 2);
    assert!(first.is_liked_by("luis"));
}

#[tokio::test]
async fn test_toggle_like_twice_restores_membership() {
    let (app, _uploads) = test_app();

    let (status, first): (_, ToggleLikeResponse) =
        post_json(&app, "/posts/2/like", json!({ "username": "ana" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first.liked);
    assert_eq!(first.likes, vec!["ana".to_string()]);

    let (_, second): (_, ToggleLikeResponse) =
        post_json(&app, "/posts/2/like", json!({ "username": "ana" })).await;
    assert!(!second.liked);
    assert!(second.likes.is_empty());

    let (_, likes): (_, Vec<String>) = get_json(&app, "/posts/2/likes").await;
    assert!(likes.is_empty());
}

#[tokio::test]
async fn test_toggle_like_with_repeated_token_applies_once() {
    let (app, _uploads) = test_app();
    let token = Uuid::new_v4();
    let payload = json!({ "username": "marta", "token": token });

    let (_, first): (_, ToggleLikeResponse) = post_json(&app, "/posts/3/like", payload.clone()).await;
    let (_, replay): (_, ToggleLikeResponse) = post_json(&app, "/posts/3/like", payload).await;

    assert!(first.liked);
    assert!(replay.liked);
    assert_eq!(replay.likes.len(), 2);
    assert!(replay.likes.contains(&"marta".to_string()));
}

#[tokio::test]
async fn test_like_token_reused_by_another_user_is_rejected() {
    let (app, _uploads) = test_app();
    let token = Uuid::new_v4();

    let (status, _): (_, ToggleLikeResponse) =
        post_json(&app, "/posts/3/like", json!({ "username": "marta", "token": token })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, error): (_, ErrorResponse) =
        post_json(&app, "/posts/3/like", json!({ "username": "pablo", "token": token })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.kind, ErrorKind::Validation);

    let (_, likes): (_, Vec<String>) = get_json(&app, "/posts/3/likes").await;
    assert!(!likes.contains(&"pablo".to_string()));
}

#[tokio::test]
async fn test_comment_with_repeated_token_is_stored_once() {
    let (app, _uploads) = test_app();
    let token = Uuid::new_v4();
    let payload = json!({ "username": "pablo", "text": "Lo vi en Sol", "token": token });

    let (status, first): (_, Comment) = post_json(&app, "/posts/2/comments", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, replay): (_, Comment) = post_json(&app, "/posts/2/comments", payload).await;
    assert_eq!(first, replay);

    let (_, comments): (_, Vec<Comment>) = get_json(&app, "/posts/2/comments").await;
    assert_eq!(comments.len(), 2);
    assert_eq!(comments.last().unwrap().text, "Lo vi en Sol");
}

#[tokio::test]
async fn test_blank_comment_is_rejected() {
    let (app, _uploads) = test_app();
    let (status, error): (_, ErrorResponse) =
        post_json(&app, "/posts/1/comments", json!({ "username": "ana", "text": "   " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.kind, ErrorKind::Validation);
    assert!(error.details.unwrap().starts_with("text"));
}

#[tokio::test]
async fn test_missing_post_is_not_found() {
    let (app, _uploads) = test_app();

    let (status, error): (_, ErrorResponse) = get_json(&app, "/posts/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error.kind, ErrorKind::NotFound);

    let (status, _): (_, ErrorResponse) =
        post_json(&app, "/posts/999/like", json!({ "username": "ana" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _): (_, ErrorResponse) =
        post_json(&app, "/posts/999/comments", json!({ "username": "ana", "text": "hola" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_post_id_is_bad_request() {
    let (app, _uploads) = test_app();
    let (status, error): (_, ErrorResponse) = get_json(&app, "/posts/abc/comments").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.kind, ErrorKind::Validation);

    let (status, _): (_, ErrorResponse) = get_json(&app, "/posts/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feed_reflects_new_comment_after_cached_read() {
    let (app, _uploads) = test_app();

    // Warm the cache
    let (_, before): (_, Vec<FeedPost>) = get_json(&app, "/posts").await;
    let count_before = before.iter().find(|p| p.post.id == 3).unwrap().comments.len();

    let (status, _): (_, Comment) =
        post_json(&app, "/posts/3/comments", json!({ "username": "luis", "text": "Otra vez!" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, after): (_, Vec<FeedPost>) = get_json(&app, "/posts").await;
    let count_after = after.iter().find(|p| p.post.id == 3).unwrap().comments.len();
    assert_eq!(count_after, count_before + 1);
}

fn multipart_body(boundary: &str, image: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"kevin.png\"\r\nContent-Type: image/png\r\n\r\n",
            boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

fn multipart_request(body: Vec<u8>, boundary: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/posts")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_create_post_uploads_image_and_tops_the_feed() {
    let (app, uploads) = test_app();
    let boundary = "kevinboundary";
    let body = multipart_body(
        boundary,
        b"\x89PNG fake image",
        &[("comment", "En el Retiro"), ("latitude", "40.4153"), ("longitude", "-3.6845")],
    );

    let (status, body) = send(&app, multipart_request(body, boundary)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: CreatePostResponse = serde_json::from_slice(&body).unwrap();

    assert_eq!(created.post.comment.as_deref(), Some("En el Retiro"));
    assert!(created.post.image_url.starts_with("http://kevin.test/uploads/"));
    assert!(created.post.image_url.ends_with(".png"));

    let object_name = created.post.image_url.rsplit('/').next().unwrap();
    let stored = std::fs::read(uploads.path().join(object_name)).unwrap();
    assert_eq!(stored, b"\x89PNG fake image");

    let (_, feed): (_, Vec<FeedPost>) = get_json(&app, "/posts").await;
    assert_eq!(feed[0].post.id, created.post.id);
    assert!(feed[0].comments.is_empty());
    assert!(feed[0].likes.is_empty());
}

#[tokio::test]
async fn test_create_post_without_location_is_rejected() {
    let (app, _uploads) = test_app();
    let boundary = "kevinboundary";
    let body = multipart_body(boundary, b"img", &[("latitude", "40.0")]);

    let (status, body) = send(&app, multipart_request(body, boundary)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.kind, ErrorKind::Validation);

    let (_, feed): (_, Vec<FeedPost>) = get_json(&app, "/posts").await;
    assert_eq!(feed.len(), 3);
}

#[tokio::test]
async fn test_failed_post_insert_removes_uploaded_image() {
    let uploads = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    db.initialize().unwrap();
    db.pool
        .get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_posts BEFORE INSERT ON posts
             BEGIN SELECT RAISE(ABORT, 'posts are read only'); END;",
        )
        .unwrap();
    let bucket = ContentBucket::new(uploads.path(), "http://kevin.test").unwrap();
    let app = build_router(AppState::new(db, bucket));

    let boundary = "kevinboundary";
    let body = multipart_body(boundary, b"img", &[("latitude", "40.0"), ("longitude", "-3.7")]);
    let (status, body) = send(&app, multipart_request(body, boundary)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.kind, ErrorKind::Storage);
    assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);
}
