use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::backend::BackendError;

pub const INTERNAL_ERROR_MESSAGE: &str = "خطای داخلی سرور";
pub const RATE_LIMITED_MESSAGE: &str = "تعداد درخواست‌ها بیش از حد مجاز است. لطفاً بعداً تلاش کنید.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
        }
    }

    /// Client-facing body for `err`. Backend and internal detail never
    /// leaves the process.
    pub fn from_app_error(err: &AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::new("validation_error", msg, 422),
            AppError::NotFound(msg) => Self::new("not_found", msg, 404),
            AppError::RateLimited { .. } => Self::new("rate_limit_exceeded", RATE_LIMITED_MESSAGE, 429),
            AppError::Backend(_) | AppError::Internal(_) => {
                Self::new("internal_error", INTERNAL_ERROR_MESSAGE, 500)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Backend(err) => {
                tracing::error!(error = ?err, "Backend call failed");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Unhandled internal error");
            }
            AppError::RateLimited { .. } => {}
            AppError::Validation(msg) | AppError::NotFound(msg) => {
                tracing::debug!(reason = %msg, "Request rejected");
            }
        }

        let body = ErrorResponse::from_app_error(&self);
        let status = StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after } = self {
            // Round up so clients never retry a moment too early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}
