// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type shared by the services and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An operation needed a signed-in user and there was none.
    #[error("User not authenticated")]
    NotAuthenticated,

    /// Sign-in, sign-out, or session token failure.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Document database read or write failure.
    #[error("Network error: {0}")]
    Network(String),

    /// A document did not match its expected shape.
    #[error("Failed to decode document: {0}")]
    Decode(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Local key-value store failure.
    #[error("Local store error: {0}")]
    LocalStore(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the error came from the document database.
    pub fn is_network_error(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl From<crate::local::LocalStoreError> for AppError {
    fn from(err: crate::local::LocalStoreError) -> Self {
        AppError::LocalStore(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated", None),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "auth_error", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Network(msg) => {
                tracing::error!(error = %msg, "Document database error");
                (StatusCode::BAD_GATEWAY, "network_error", Some(msg.clone()))
            }
            AppError::Decode(msg) => {
                tracing::error!(error = %msg, "Document decode error");
                (StatusCode::INTERNAL_SERVER_ERROR, "decode_error", None)
            }
            AppError::LocalStore(msg) => {
                tracing::error!(error = %msg, "Local store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "local_store_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type Result<T> = std::result::Result<T, AppError>;
