use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use warren_db::error::StoreError;

/// Handler-level error. Every storage failure arrives here already shaped by
/// the StoreError taxonomy and is rendered as a `{"error": ...}` JSON body
/// with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn internal<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(store) => match store {
                StoreError::Validation { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
                StoreError::DuplicateName | StoreError::DuplicateCredential => {
                    (StatusCode::CONFLICT, self.to_string())
                }
                StoreError::NotFound(_) | StoreError::ParentNotFound => {
                    (StatusCode::NOT_FOUND, self.to_string())
                }
                StoreError::Sqlite(_) | StoreError::LockPoisoned => {
                    error!("storage failure: {}", store);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
                }
            },
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Internal(err) => {
                error!("internal error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
