use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::Database;
use crate::error::{Result, StoreError, is_unique_violation};
use crate::models::{ChannelRow, decode_path};
use crate::tree;
use warren_types::models::{ChannelId, UserId};

pub const MAX_CHANNEL_NAME_LEN: usize = 255;

impl Database {
    /// Create a channel, optionally under a parent. The new channel's path is
    /// materialized inside the same transaction as the insert.
    pub fn create_channel(&self, name: &str, parent_id: Option<ChannelId>) -> Result<ChannelRow> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::validation("name", "name is required"));
        }
        if name.chars().count() > MAX_CHANNEL_NAME_LEN {
            return Err(StoreError::validation(
                "name",
                "name must be at most 255 characters",
            ));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(pid) = parent_id {
                if !channel_exists(&tx, pid)? {
                    return Err(StoreError::ParentNotFound);
                }
            }

            // Soft duplicate guard; the UNIQUE constraint below is the hard
            // backstop when a concurrent insert races past this check.
            if tx
                .query_row("SELECT 1 FROM channels WHERE name = ?1", [&name], |_| {
                    Ok(())
                })
                .optional()?
                .is_some()
            {
                return Err(StoreError::DuplicateName);
            }

            match tx.execute(
                "INSERT INTO channels (name, parent_id) VALUES (?1, ?2)",
                params![name, parent_id],
            ) {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateName),
                Err(e) => return Err(e.into()),
            }

            let id = tx.last_insert_rowid();
            tree::reconcile(&*tx, &[id])?;

            let row = fetch_channel(&tx, id)?.ok_or(StoreError::NotFound("channel"))?;
            tx.commit()?;
            debug!("Created channel {} ({:?})", row.id, row.name);
            Ok(row)
        })
    }

    pub fn get_channel(&self, id: ChannelId) -> Result<ChannelRow> {
        self.with_conn(|conn| fetch_channel(conn, id)?.ok_or(StoreError::NotFound("channel")))
    }

    pub fn follower_count(&self, id: ChannelId) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM user_channel_follows WHERE channel_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Move a channel under a new parent (or detach it with `None`). The
    /// paths of the channel and its whole subtree are rewritten in the same
    /// transaction.
    pub fn set_channel_parent(
        &self,
        id: ChannelId,
        parent_id: Option<ChannelId>,
    ) -> Result<ChannelRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !channel_exists(&tx, id)? {
                return Err(StoreError::NotFound("channel"));
            }
            if let Some(pid) = parent_id {
                if !channel_exists(&tx, pid)? {
                    return Err(StoreError::ParentNotFound);
                }
            }

            tx.execute(
                "UPDATE channels SET parent_id = ?1 WHERE id = ?2",
                params![parent_id, id],
            )?;
            tree::reconcile(&*tx, &[id])?;

            let row = fetch_channel(&tx, id)?.ok_or(StoreError::NotFound("channel"))?;
            tx.commit()?;
            debug!("Reparented channel {} under {:?}", id, parent_id);
            Ok(row)
        })
    }

    /// Delete a channel. Posts and follow rows cascade; child channels are
    /// detached (parent set to NULL) and their paths eagerly truncated, so no
    /// committed path ever contains a dead ancestor id.
    pub fn delete_channel(&self, id: ChannelId) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let children: Vec<ChannelId> = {
                let mut stmt = tx.prepare("SELECT id FROM channels WHERE parent_id = ?1")?;
                let rows = stmt
                    .query_map([id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<ChannelId>>>()?;
                rows
            };

            let deleted = tx.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound("channel"));
            }

            // The SET NULL trigger has already detached the children; they
            // are now roots and their subtrees need fresh paths.
            tree::reconcile(&*tx, &children)?;

            tx.commit()?;
            debug!("Deleted channel {} ({} children detached)", id, children.len());
            Ok(())
        })
    }

    /// Follow a channel. Returns `true` when a new membership was created,
    /// `false` when the pair already existed. A concurrent identical request
    /// losing the race on the composite key is reported as `false`, never as
    /// an error.
    pub fn follow(&self, user_id: UserId, channel_id: ChannelId) -> Result<bool> {
        self.with_conn(|conn| {
            if !channel_exists(conn, channel_id)? {
                return Err(StoreError::NotFound("channel"));
            }

            match conn.execute(
                "INSERT INTO user_channel_follows (user_id, channel_id) VALUES (?1, ?2)",
                params![user_id, channel_id],
            ) {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Removing a membership that does not exist is a silent no-op.
    pub fn unfollow(&self, user_id: UserId, channel_id: ChannelId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM user_channel_follows WHERE user_id = ?1 AND channel_id = ?2",
                params![user_id, channel_id],
            )?;
            Ok(())
        })
    }
}

fn channel_exists(conn: &Connection, id: ChannelId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM channels WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn fetch_channel(conn: &Connection, id: ChannelId) -> Result<Option<ChannelRow>> {
    let mut stmt = conn
        .prepare("SELECT id, name, parent_id, path, created_at FROM channels WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(ChannelRow {
                id: row.get(0)?,
                name: row.get(1)?,
                parent_id: row.get(2)?,
                path: decode_path(&row.get::<_, String>(3)?),
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
