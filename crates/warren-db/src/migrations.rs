use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            email           TEXT NOT NULL UNIQUE,
            username        TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            bio             TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            parent_id   INTEGER REFERENCES channels(id) ON DELETE SET NULL,
            path        TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_channels_parent
            ON channels(parent_id);

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            channel_id  INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            body        TEXT NOT NULL,
            tags        TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_channel
            ON posts(channel_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_posts_user
            ON posts(user_id);

        -- Composite PK doubles as the follow-idempotency backstop
        CREATE TABLE IF NOT EXISTS user_channel_follows (
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            channel_id  INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, channel_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
