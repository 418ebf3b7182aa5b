use rusqlite::{OptionalExtension, params};

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::PostRow;
use warren_types::models::{ChannelId, PostId, UserId};

pub const MAX_BODY_LEN: usize = 255;
pub const MAX_TAGS_LEN: usize = 255;

impl Database {
    /// Create a post in a channel. Tags are free-form comma-separated text;
    /// blank tags collapse to NULL.
    pub fn create_post(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        body: &str,
        tags: Option<&str>,
    ) -> Result<PostRow> {
        let body = body.trim().to_string();
        if body.is_empty() {
            return Err(StoreError::validation("body", "body is required"));
        }
        if body.chars().count() > MAX_BODY_LEN {
            return Err(StoreError::validation(
                "body",
                "body must be at most 255 characters",
            ));
        }
        let tags = tags.map(str::trim).filter(|t| !t.is_empty());
        if tags.is_some_and(|t| t.chars().count() > MAX_TAGS_LEN) {
            return Err(StoreError::validation(
                "tags",
                "tags must be at most 255 characters",
            ));
        }

        self.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM channels WHERE id = ?1", [channel_id], |_| {
                    Ok(())
                })
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound("channel"));
            }

            conn.execute(
                "INSERT INTO posts (user_id, channel_id, body, tags) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, channel_id, body, tags],
            )?;

            let id = conn.last_insert_rowid();
            fetch_post(conn, id)?.ok_or(StoreError::NotFound("post"))
        })
    }

    /// Newest first, ties broken by id so insertion order wins within a
    /// single timestamp.
    pub fn list_channel_posts(&self, channel_id: ChannelId) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM channels WHERE id = ?1", [channel_id], |_| {
                    Ok(())
                })
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound("channel"));
            }

            let mut stmt = conn.prepare(
                "SELECT id, user_id, channel_id, body, tags, created_at
                 FROM posts
                 WHERE channel_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([channel_id], map_post)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// A user's own posts, newest first — the profile-page listing.
    pub fn list_user_posts(&self, user_id: UserId) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [user_id], |_| Ok(()))
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound("user"));
            }

            let mut stmt = conn.prepare(
                "SELECT id, user_id, channel_id, body, tags, created_at
                 FROM posts
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_post)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: PostId) -> Result<PostRow> {
        self.with_conn(|conn| fetch_post(conn, id)?.ok_or(StoreError::NotFound("post")))
    }
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_id: row.get(2)?,
        body: row.get(3)?,
        tags: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn fetch_post(conn: &rusqlite::Connection, id: PostId) -> Result<Option<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, channel_id, body, tags, created_at FROM posts WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_post).optional()?;
    Ok(row)
}
