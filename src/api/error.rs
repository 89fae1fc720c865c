use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } | AppError::CapacityExhausted { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::JobNotFound(_) | AppError::DownloadNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DownloadExpired(_) => StatusCode::GONE,
            AppError::InvalidTransition { .. }
            | AppError::Browser(_)
            | AppError::Io(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::CapacityExhausted { .. } => "capacity_exhausted",
            AppError::JobNotFound(_) => "job_not_found",
            AppError::DownloadNotFound(_) => "download_not_found",
            AppError::DownloadExpired(_) => "download_expired",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Browser(_) => "browser_error",
            AppError::Io(_) => "io_error",
            AppError::Config(_) => "config_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
