use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

use kevin_types::{Like, PostId};

use super::TokenConflict;
use crate::db::{format_timestamp, parse_timestamp, DbPool};

pub struct LikeRepository {
    pool: DbPool,
}

impl LikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Flip the existence of the (post, username) row inside one transaction.
    ///
    /// Returns whether the user likes the post afterwards. A token that was
    /// already processed returns its recorded result without toggling again,
    /// and fails with `TokenConflict` if it was recorded for another post or user.
    pub fn toggle(&self, post_id: PostId, username: &str, token: Option<Uuid>) -> Result<bool> {
        let mut conn = self.pool.get()?;
        // Take the write lock up front so concurrent toggles wait on the busy
        // timeout instead of failing on a read-to-write upgrade
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start like transaction")?;

        if let Some(token) = token {
            if let Some(liked) = Self::recorded_outcome(&tx, token, post_id, username)? {
                tracing::debug!("Like token {} already processed", token);
                return Ok(liked);
            }
        }

        // No matching row is the "not liked" case, not an error
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM post_likes WHERE post_id = ? AND username = ?",
                (post_id, username),
                |row| row.get(0),
            )
            .optional()?;

        let now = format_timestamp(Utc::now());
        let liked = match existing {
            Some(id) => {
                tx.execute("DELETE FROM post_likes WHERE id = ?", [id])
                    .context("Failed to delete like")?;
                false
            }
            None => {
                tx.execute(
                    "INSERT INTO post_likes (post_id, username, created_at) VALUES (?, ?, ?)",
                    (post_id, username, &now),
                )
                .context("Failed to insert like")?;
                true
            }
        };

        if let Some(token) = token {
            tx.execute(
                "INSERT INTO mutation_tokens (token, post_id, username, liked, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                (token.to_string(), post_id, username, liked, &now),
            )
            .context("Failed to record like token")?;
        }

        tx.commit().context("Failed to commit like toggle")?;
        Ok(liked)
    }

    fn recorded_outcome(
        tx: &Transaction<'_>,
        token: Uuid,
        post_id: PostId,
        username: &str,
    ) -> Result<Option<bool>> {
        let recorded: Option<(PostId, String, bool)> = tx
            .query_row(
                "SELECT post_id, username, liked FROM mutation_tokens WHERE token = ?",
                [token.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match recorded {
            Some((recorded_post, recorded_user, liked))
                if recorded_post == post_id && recorded_user == username =>
            {
                Ok(Some(liked))
            }
            Some(_) => Err(TokenConflict { token }.into()),
            None => Ok(None),
        }
    }

    /// Usernames that like a post, in the order they liked it
    pub fn usernames_for_post(&self, post_id: PostId) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT username FROM post_likes WHERE post_id = ? ORDER BY created_at ASC, id ASC",
        )?;

        let usernames = stmt
            .query_map([post_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to load likes")?;

        Ok(usernames)
    }

    /// Every like row, grouped by post
    pub fn list_all(&self) -> Result<Vec<Like>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, username, created_at
             FROM post_likes
             ORDER BY post_id, created_at ASC, id ASC",
        )?;

        let likes = stmt
            .query_map([], |row| {
                Ok(Like {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    username: row.get(2)?,
                    created_at: parse_timestamp(3, row.get(3)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load likes")?;

        Ok(likes)
    }
}
