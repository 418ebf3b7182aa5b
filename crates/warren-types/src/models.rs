/// Integer row ids, assigned by SQLite on insert.
pub type UserId = i64;
pub type ChannelId = i64;
pub type PostId = i64;
