use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::Database;
use crate::error::{Result, StoreError, is_unique_violation};
use crate::models::UserRow;
use warren_types::models::UserId;

pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_BIO_LEN: usize = 256;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 80;

impl Database {
    /// Register a user. Emails are normalized to lowercase; usernames are
    /// case-sensitive, matching the UNIQUE index. The caller supplies the
    /// Argon2 hash — cleartext passwords never reach this layer.
    pub fn create_user(&self, email: &str, username: &str, password_hash: &str) -> Result<UserRow> {
        let email = email.trim().to_lowercase();
        let username = username.trim().to_string();

        if email.is_empty() || !email.contains('@') || email.chars().count() > MAX_EMAIL_LEN {
            return Err(StoreError::validation("email", "a valid email is required"));
        }
        let username_len = username.chars().count();
        if username_len < MIN_USERNAME_LEN || username_len > MAX_USERNAME_LEN {
            return Err(StoreError::validation(
                "username",
                "username must be 3 to 80 characters",
            ));
        }

        self.with_conn(|conn| {
            // Pre-check for a friendlier error; the UNIQUE indexes catch the
            // race loser below.
            if conn
                .query_row(
                    "SELECT 1 FROM users WHERE email = ?1 OR username = ?2",
                    params![email, username],
                    |_| Ok(()),
                )
                .optional()?
                .is_some()
            {
                return Err(StoreError::DuplicateCredential);
            }

            match conn.execute(
                "INSERT INTO users (email, username, password_hash) VALUES (?1, ?2, ?3)",
                params![email, username, password_hash],
            ) {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateCredential),
                Err(e) => return Err(e.into()),
            }

            let id = conn.last_insert_rowid();
            debug!("Registered user {} ({})", id, username);
            fetch_user(conn, id)?.ok_or(StoreError::NotFound("user"))
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<UserRow> {
        self.with_conn(|conn| fetch_user(conn, id)?.ok_or(StoreError::NotFound("user")))
    }

    /// Login lookup: the identifier may be an email (matched lowercased) or
    /// a username (matched exactly).
    pub fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<UserRow>> {
        let ident = identifier.trim();
        let email = ident.to_lowercase();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, username, password_hash, bio, created_at
                 FROM users WHERE email = ?1 OR username = ?2",
            )?;
            let row = stmt.query_row(params![email, ident], map_user).optional()?;
            Ok(row)
        })
    }

    pub fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    pub fn update_bio(&self, id: UserId, bio: Option<&str>) -> Result<UserRow> {
        let bio = bio.map(str::trim).filter(|b| !b.is_empty());
        if bio.is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
            return Err(StoreError::validation(
                "bio",
                "bio must be at most 256 characters",
            ));
        }

        self.with_conn(|conn| {
            let updated = conn.execute("UPDATE users SET bio = ?1 WHERE id = ?2", params![bio, id])?;
            if updated == 0 {
                return Err(StoreError::NotFound("user"));
            }
            fetch_user(conn, id)?.ok_or(StoreError::NotFound("user"))
        })
    }

    /// Deleting a user cascades its posts and follow rows at the storage
    /// layer.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound("user"));
            }
            debug!("Deleted user {}", id);
            Ok(())
        })
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        bio: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn fetch_user(conn: &Connection, id: UserId) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, username, password_hash, bio, created_at FROM users WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_user).optional()?;
    Ok(row)
}
