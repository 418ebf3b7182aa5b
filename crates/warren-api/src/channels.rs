use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use warren_db::error::StoreError;
use warren_db::models::{ChannelRow, parse_timestamp};
use warren_types::api::{
    ChannelResponse, Claims, CreateChannelRequest, FollowResponse, ReparentChannelRequest,
};
use warren_types::models::ChannelId;

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.create_channel(&req.name, req.parent_id))
        .await
        .map_err(ApiError::internal)??;

    Ok((StatusCode::CREATED, Json(channel_response(row, None))))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<ChannelResponse>, ApiError> {
    let db = state.clone();
    let (row, followers) = tokio::task::spawn_blocking(move || {
        let row = db.db.get_channel(channel_id)?;
        let followers = db.db.follower_count(channel_id)?;
        Ok::<_, StoreError>((row, followers))
    })
    .await
    .map_err(ApiError::internal)??;

    Ok(Json(channel_response(row, Some(followers))))
}

pub async fn reparent_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<ReparentChannelRequest>,
) -> Result<Json<ChannelResponse>, ApiError> {
    let db = state.clone();
    let row =
        tokio::task::spawn_blocking(move || db.db.set_channel_parent(channel_id, req.parent_id))
            .await
            .map_err(ApiError::internal)??;

    Ok(Json(channel_response(row, None)))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Extension(_claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.delete_channel(channel_id))
        .await
        .map_err(ApiError::internal)??;

    Ok(StatusCode::NO_CONTENT)
}

/// Idempotent: 201 with `created: true` on the first follow, 200 with
/// `created: false` on every repeat.
pub async fn follow(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let db = state.clone();
    let created = tokio::task::spawn_blocking(move || db.db.follow(user_id, channel_id))
        .await
        .map_err(ApiError::internal)??;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(FollowResponse { created })))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let user_id = claims.sub;
    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.unfollow(user_id, channel_id))
        .await
        .map_err(ApiError::internal)??;

    Ok(StatusCode::NO_CONTENT)
}

fn channel_response(row: ChannelRow, follower_count: Option<u64>) -> ChannelResponse {
    ChannelResponse {
        id: row.id,
        name: row.name,
        parent_id: row.parent_id,
        created_at: parse_timestamp(&row.created_at),
        follower_count,
    }
}
