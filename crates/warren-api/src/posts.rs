use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use warren_db::models::{PostRow, parse_timestamp};
use warren_types::api::{Claims, CreatePostRequest, PostResponse};
use warren_types::models::{ChannelId, UserId};

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn create_post(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.db
            .create_post(user_id, channel_id, &req.body, req.tags.as_deref())
    })
    .await
    .map_err(ApiError::internal)??;

    Ok((StatusCode::CREATED, Json(post_response(row))))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_channel_posts(channel_id))
        .await
        .map_err(ApiError::internal)??;

    Ok(Json(rows.into_iter().map(post_response).collect()))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_user_posts(user_id))
        .await
        .map_err(ApiError::internal)??;

    Ok(Json(rows.into_iter().map(post_response).collect()))
}

fn post_response(row: PostRow) -> PostResponse {
    PostResponse {
        id: row.id,
        user_id: row.user_id,
        channel_id: row.channel_id,
        body: row.body,
        tags: row.tags,
        created_at: parse_timestamp(&row.created_at),
    }
}
