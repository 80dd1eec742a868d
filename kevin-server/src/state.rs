use crate::db::Database;
use crate::feed_cache::FeedCache;
use crate::storage::ContentBucket;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub bucket: ContentBucket,
    pub feed_cache: FeedCache,
}

impl AppState {
    pub fn new(db: Database, bucket: ContentBucket) -> Self {
        Self {
            db,
            bucket,
            feed_cache: FeedCache::new(),
        }
    }
}
