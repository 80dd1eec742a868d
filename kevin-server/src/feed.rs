use std::collections::HashMap;

use anyhow::Result;

use kevin_types::{Comment, FeedPost, PostId};

use crate::db::repositories::{CommentRepository, LikeRepository, PostRepository};
use crate::db::DbPool;

/// Build the whole feed: posts newest first, each with comments oldest first
/// and the usernames that like it.
pub fn load_feed(pool: &DbPool) -> Result<Vec<FeedPost>> {
    let posts = PostRepository::new(pool.clone()).list_newest_first()?;

    let mut comments_by_post: HashMap<PostId, Vec<Comment>> = HashMap::new();
    for comment in CommentRepository::new(pool.clone()).list_all()? {
        comments_by_post.entry(comment.post_id).or_default().push(comment);
    }

    let mut likes_by_post: HashMap<PostId, Vec<String>> = HashMap::new();
    for like in LikeRepository::new(pool.clone()).list_all()? {
        likes_by_post.entry(like.post_id).or_default().push(like.username);
    }

    let feed = posts
        .into_iter()
        .map(|post| FeedPost {
            comments: comments_by_post.remove(&post.id).unwrap_or_default(),
            likes: likes_by_post.remove(&post.id).unwrap_or_default(),
            post,
        })
        .collect();

    Ok(feed)
}

/// A single post with its comments and likes
pub fn load_feed_post(pool: &DbPool, post_id: PostId) -> Result<Option<FeedPost>> {
    let Some(post) = PostRepository::new(pool.clone()).get_by_id(post_id)? else {
        return Ok(None);
    };

    Ok(Some(FeedPost {
        comments: CommentRepository::new(pool.clone()).list_for_post(post_id)?,
        likes: LikeRepository::new(pool.clone()).usernames_for_post(post_id)?,
        post,
    }))
}
