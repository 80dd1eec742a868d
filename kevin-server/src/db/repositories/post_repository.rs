use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use kevin_types::{Post, PostId};

use crate::db::{format_timestamp, parse_timestamp, DbPool};

const POST_COLUMNS: &str = "id, image_url, comment, latitude, longitude, created_at";

/// Fields Kevin supplies for a new sighting; id and timestamp are assigned here.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub image_url: String,
    pub comment: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            image_url: row.get(1)?,
            comment: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            created_at: parse_timestamp(5, row.get(5)?)?,
        })
    }

    /// Insert a new post and return it with its assigned id
    pub fn create(&self, new_post: &NewPost) -> Result<Post> {
        let conn = self.pool.get()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO posts (image_url, comment, latitude, longitude, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                &new_post.image_url,
                new_post.comment.as_deref(),
                new_post.latitude,
                new_post.longitude,
                format_timestamp(created_at),
            ),
        )
        .context("Failed to create post")?;

        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_by_id(id)?
            .context("Post vanished right after insert")
    }

    /// All posts, newest first
    pub fn list_newest_first(&self) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let query = format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;

        let posts = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load posts")?;

        Ok(posts)
    }

    /// Get a single post by ID
    pub fn get_by_id(&self, post_id: PostId) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let query = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let mut stmt = conn.prepare(&query)?;

        let post = stmt
            .query_row([post_id], Self::map_row)
            .optional()
            .context("Failed to load post")?;

        Ok(post)
    }

    pub fn exists(&self, post_id: PostId) -> Result<bool> {
        let conn = self.pool.get()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM posts WHERE id = ?", [post_id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }
}
