use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 同步流程对外暴露的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Codeforces handle is required")]
    InvalidInput,

    #[error("Failed to fetch from Codeforces API")]
    UpstreamUnavailable,

    #[error("{0}")]
    UpstreamRejected(String),

    #[error("Internal server error")]
    Internal(String),
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::InvalidInput | SyncError::UpstreamRejected(_) => StatusCode::BAD_REQUEST,
            SyncError::UpstreamUnavailable | SyncError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

/// 用户相关接口的错误
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Internal server error")]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Sync(e) => e.status_code(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(e) => {
                log::error!("Storage failure: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        error_response(status, self.to_string())
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
