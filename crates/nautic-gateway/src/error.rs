//! Error handling for the gateway.

use axum::{
    extract::multipart::MultipartError,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use nautic_core::{Error as CoreError, InitError, Rejection};
use serde::Serialize;

use crate::vision::VisionError;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed or expired credentials.
    Unauthorized(String),
    /// An optional subsystem could not be initialized.
    ServiceUnavailable(String),
    /// Bad request.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(_) | CoreError::DuplicateUser(_) => {
                AppError::BadRequest(err.to_string())
            }
            CoreError::AuthFailure | CoreError::Token(_) => AppError::Unauthorized(err.to_string()),
            CoreError::Init(init) => init.into(),
            CoreError::Hash(_) | CoreError::Config(_) => {
                tracing::error!(error = %err, "internal error");
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<InitError> for AppError {
    fn from(err: InitError) -> Self {
        AppError::ServiceUnavailable(format!("{} service not available", err.capability))
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::Unauthorized(rejection.to_string())
    }
}

impl From<VisionError> for AppError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::InvalidImage(_) => AppError::BadRequest(err.to_string()),
            VisionError::Inference(_) => {
                tracing::error!(error = %err, "vision backend error");
                AppError::Internal(format!("error processing image: {}", err))
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("invalid upload: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        AppError::Internal("internal task failed".to_string())
    }
}
