use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use kevin_types::{FeedPost, PostId};

use super::store::PostEcho;

/// Echo of one post shared between the view and in-flight mutations
pub type SharedEcho = Arc<Mutex<PostEcho>>;

/// Lock an echo. A panic while holding the lock cannot leave the echo
/// half-written, so a poisoned lock is still usable.
pub fn lock_echo(echo: &SharedEcho) -> std::sync::MutexGuard<'_, PostEcho> {
    echo.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Echoes for every post the client has loaded
#[derive(Default, Clone)]
pub struct EchoRegistry {
    echoes: Arc<Mutex<HashMap<PostId, SharedEcho>>>,
}

impl EchoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_feed(feed: &[FeedPost]) -> Self {
        let registry = Self::new();
        for post in feed {
            registry.load(post);
        }
        registry
    }

    /// Seed (or reset) the echo of a post from server data
    pub fn load(&self, post: &FeedPost) -> SharedEcho {
        let echo = Arc::new(Mutex::new(PostEcho::from_feed_post(post)));
        self.echoes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(post.post.id, Arc::clone(&echo));
        echo
    }

    /// Echo for a post, empty if the post was never loaded
    pub fn echo_for(&self, post_id: PostId) -> SharedEcho {
        let mut echoes = self.echoes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            echoes
                .entry(post_id)
                .or_insert_with(|| Arc::new(Mutex::new(PostEcho::new(post_id)))),
        )
    }

    pub fn get(&self, post_id: PostId) -> Option<SharedEcho> {
        self.echoes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&post_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.echoes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kevin_types::Post;

    fn feed_post(id: PostId, likes: &[&str]) -> FeedPost {
        FeedPost {
            post: Post {
                id,
                image_url: format!("http://localhost:3000/uploads/{}.jpg", id),
                comment: None,
                latitude: 0.0,
                longitude: 0.0,
                created_at: Utc::now(),
            },
            comments: vec![],
            likes: likes.iter().map(|u| u.to_string()).collect(),
        }
    }

    #[test]
    fn test_from_feed_and_lookup() {
        let registry = EchoRegistry::from_feed(&[feed_post(1, &["ana"]), feed_post(2, &[])]);
        assert_eq!(registry.len(), 2);

        let echo = registry.get(1).unwrap();
        assert!(lock_echo(&echo).is_liked_by("ana"));
    }

    #[test]
    fn test_echo_for_unknown_post_is_empty_and_shared() {
        let registry = EchoRegistry::new();
        let first = registry.echo_for(9);
        let second = registry.echo_for(9);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lock_echo(&first).post_id(), 9);
        assert_eq!(lock_echo(&first).like_count(), 0);
    }
}
