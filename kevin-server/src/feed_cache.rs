use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use kevin_types::FeedPost;

/// Cached rendering of the full feed.
///
/// Every mutation calls [`FeedCache::invalidate`], which bumps a generation
/// counter. A feed built from the database is only stored if no invalidation
/// happened while it was being built, so a slow reader cannot re-cache stale
/// data.
#[derive(Clone, Default)]
pub struct FeedCache {
    entry: Arc<RwLock<Option<Arc<Vec<FeedPost>>>>>,
    generation: Arc<AtomicU64>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation; read it before loading the feed from the database
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn get(&self) -> Option<Arc<Vec<FeedPost>>> {
        self.entry.read().await.clone()
    }

    /// Store a feed built at `generation`. Returns false when it was already stale.
    pub async fn store(&self, generation: u64, feed: Arc<Vec<FeedPost>>) -> bool {
        let mut entry = self.entry.write().await;
        if self.generation() != generation {
            return false;
        }
        *entry = Some(feed);
        true
    }

    pub async fn invalidate(&self) {
        let mut entry = self.entry.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *entry = None;
        tracing::debug!("Feed cache invalidated");
    }
}
