use serde::{Deserialize, Serialize};

use crate::models::{ChannelId, PostId, UserId};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the handlers.
/// Canonical definition lives here in warren-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Email or username — either works, matching the login form.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub password: String,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
    pub parent_id: Option<ChannelId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReparentChannelRequest {
    /// `null` detaches the channel and makes it a root.
    pub parent_id: Option<ChannelId>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: ChannelId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    /// False when the membership already existed (idempotent repeat).
    pub created: bool,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub body: String,
    pub tags: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: PostId,
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub body: String,
    pub tags: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
