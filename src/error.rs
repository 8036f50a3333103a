use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Camera device error: {0}")]
    Device(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("No frames found in captures directory")]
    NoFrames,

    #[error("Encoder failed: {0}")]
    Encoding(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Invalid request parameters are the client's fault; every
            // operation failure, an empty frame store included, is a 5xx.
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        tracing::error!(
            error_type = std::any::type_name_of_val(&self),
            error_message = %body.message,
            "Request failed"
        );

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_failures_map_to_5xx() {
        for err in [
            AppError::Device("gone".to_string()),
            AppError::Capture("read failed".to_string()),
            AppError::NoFrames,
            AppError::Encoding("exit 1".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_invalid_parameters_map_to_400() {
        let err = AppError::BadRequest("interval must be positive".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
