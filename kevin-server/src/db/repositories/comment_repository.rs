use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use kevin_types::{Comment, PostId};

use super::TokenConflict;
use crate::db::{format_timestamp, parse_timestamp, DbPool};

pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            username: row.get(2)?,
            text: row.get(3)?,
            created_at: parse_timestamp(4, row.get(4)?)?,
        })
    }

    /// Insert a comment.
    ///
    /// When a token is given and a comment with that token already exists, the
    /// existing row is returned instead of inserting a duplicate. A token first
    /// used on another post or by another user fails with `TokenConflict`.
    pub fn create(
        &self,
        post_id: PostId,
        username: &str,
        text: &str,
        token: Option<Uuid>,
    ) -> Result<Comment> {
        let conn = self.pool.get()?;
        let token_text = token.map(|t| t.to_string());

        let inserted = conn
            .execute(
                "INSERT INTO post_comments (post_id, username, comment, created_at, client_token)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(client_token) DO NOTHING",
                (
                    post_id,
                    username,
                    text,
                    format_timestamp(Utc::now()),
                    token_text.as_deref(),
                ),
            )
            .context("Failed to create comment")?;

        if inserted == 1 {
            let id = conn.last_insert_rowid();
            return Self::find(&conn, "id = ?", id)?.context("Comment not found after insert");
        }

        // Only a token collision skips the insert
        let token = token.context("Comment insert was skipped without a token")?;
        tracing::debug!("Comment token {} already stored, returning existing row", token);
        let existing = Self::find(&conn, "client_token = ?", token_text)?
            .context("Comment not found after insert")?;
        if existing.post_id != post_id || existing.username != username {
            return Err(TokenConflict { token }.into());
        }
        Ok(existing)
    }

    fn find<P: rusqlite::ToSql>(
        conn: &rusqlite::Connection,
        predicate: &str,
        value: P,
    ) -> Result<Option<Comment>> {
        let query = format!(
            "SELECT id, post_id, username, comment, created_at FROM post_comments WHERE {}",
            predicate
        );
        let comment = conn
            .query_row(&query, [value], Self::map_row)
            .optional()?;
        Ok(comment)
    }

    /// Comments on one post, oldest first
    pub fn list_for_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, username, comment, created_at
             FROM post_comments
             WHERE post_id = ?
             ORDER BY created_at ASC, id ASC",
        )?;

        let comments = stmt
            .query_map([post_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load comments")?;

        Ok(comments)
    }

    /// Every comment, grouped by post and oldest first within a post
    pub fn list_all(&self) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, username, comment, created_at
             FROM post_comments
             ORDER BY post_id, created_at ASC, id ASC",
        )?;

        let comments = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load comments")?;

        Ok(comments)
    }

    pub fn count_for_post(&self, post_id: PostId) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM post_comments WHERE post_id = ?",
            [post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
