//! Database row types — these map directly to SQLite rows.
//! Distinct from the warren-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};

use warren_types::models::ChannelId;

#[derive(Debug)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    /// Materialized ancestor path, root-first. Stored as a JSON integer array.
    pub path: Vec<ChannelId>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    pub body: String,
    pub tags: Option<String>,
    pub created_at: String,
}

pub fn encode_path(path: &[ChannelId]) -> String {
    serde_json::to_string(path).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_path(raw: &str) -> Vec<ChannelId> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC when the RFC 3339 parse fails.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
