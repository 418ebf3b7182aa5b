use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};

use warren_db::Database;
use warren_db::error::StoreError;
use warren_db::models::{UserRow, parse_timestamp};
use warren_types::api::{
    ChangePasswordRequest, Claims, LoginRequest, LoginResponse, ProfileResponse, RegisterRequest,
    RegisterResponse, UpdateProfileRequest,
};
use warren_types::models::UserId;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || {
        db.db.create_user(&req.email, &req.username, &password_hash)
    })
    .await
    .map_err(ApiError::internal)??;

    let token = create_token(&state.jwt_secret, user.id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let LoginRequest {
        identifier,
        password,
    } = req;

    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || db.db.find_user_by_identifier(&identifier))
        .await
        .map_err(ApiError::internal)??
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&user.password_hash, &password) {
        return Err(ApiError::Unauthorized);
    }

    let token = create_token(&state.jwt_secret, user.id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = claims.sub;
    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user(user_id))
        .await
        .map_err(ApiError::internal)??;

    Ok(Json(profile_response(user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = claims.sub;
    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || db.db.update_bio(user_id, req.bio.as_deref()))
        .await
        .map_err(ApiError::internal)??;

    Ok(Json(profile_response(user)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let user_id = claims.sub;
    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.set_password_hash(user_id, &password_hash))
        .await
        .map_err(ApiError::internal)??;

    Ok(StatusCode::NO_CONTENT)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if len < 6 || len > 128 {
        return Err(StoreError::validation("password", "password must be 6 to 128 characters").into());
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn create_token(secret: &str, user_id: UserId, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encoding failed: {}", e)))
}

fn profile_response(user: UserRow) -> ProfileResponse {
    ProfileResponse {
        id: user.id,
        email: user.email,
        username: user.username,
        bio: user.bio,
        created_at: parse_timestamp(&user.created_at),
    }
}
