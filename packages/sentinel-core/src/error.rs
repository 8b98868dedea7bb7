//! Centralized error types for the Sentinel core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::persistence::PersistenceError;
use crate::worker::payload::PayloadError;
use crate::worker::WorkerError;

/// Trait for error types that provide machine-readable error codes.
///
/// Cycle failures are never surfaced over HTTP, but their codes are logged so
/// operators can grep for a stable token.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DirectoryError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "camera_unresolved",
            Self::Unavailable(_) => "directory_unavailable",
        }
    }
}

impl ErrorCode for WorkerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "worker_spawn_failed",
            Self::Wait(_) | Self::Timeout(_) => "worker_exit_failed",
        }
    }
}

impl ErrorCode for PayloadError {
    fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty_output",
            Self::NoJson | Self::Malformed(_) | Self::NotAnObject => "output_parse_failed",
        }
    }
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "persistence_io_failed",
            Self::Serialization(_) => "persistence_serialization_failed",
            Self::Unavailable(_) => "persistence_unavailable",
        }
    }
}

/// Application-wide error type for the Sentinel control surface.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum SentinelError {
    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Camera id is unknown to the directory.
    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    /// Server configuration error (invalid ranges, missing worker).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The server is shutting down and accepts no new sessions.
    #[error("Server is shutting down")]
    ShuttingDown,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::CameraNotFound(_) => "camera_not_found",
            Self::Configuration(_) => "configuration_error",
            Self::ShuttingDown => "shutting_down",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::CameraNotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type SentinelResult<T> = Result<T, SentinelError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for SentinelError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DirectoryError> for SentinelError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(id) => Self::CameraNotFound(id),
            DirectoryError::Unavailable(reason) => Self::Internal(reason),
        }
    }
}
