use std::net::SocketAddr;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use messages_core::CoreError; // Import core errors
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Server-specific error types.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Template not found: {0}")]
    TemplateNotFound(u64),

    #[error("No route for path: {0}")]
    InvalidPath(String),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Core error: {0}")]
    CoreError(#[from] CoreError), // Automatically convert from CoreError

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

// Ids that do not parse never name an existing template.
impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::InvalidPath(rejection.body_text())
    }
}

// Implement IntoResponse for ServerError to automatically convert errors into HTTP responses.
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ServerError::TemplateNotFound(_) | ServerError::CoreError(CoreError::TemplateNotFound(_)) => {
                (StatusCode::NOT_FOUND, "Template not found".to_string())
            }
            ServerError::InvalidPath(reason) => (StatusCode::NOT_FOUND, format!("Not found: {}", reason)),
            ServerError::BadRequest(reason) => (StatusCode::BAD_REQUEST, format!("Bad request: {}", reason)),
            ServerError::CoreError(CoreError::Configuration(msg)) => {
                (StatusCode::BAD_REQUEST, format!("Configuration error: {}", msg))
            }
            ServerError::CoreError(CoreError::IoError { path, source }) => {
                error!(path = ?path, error = %source, "Core I/O error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error (I/O)".to_string())
            }
            ServerError::CoreError(CoreError::Serialization(msg) | CoreError::Deserialization(msg)) => {
                error!(error = %msg, "Core serialization/deserialization error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error (Serialization)".to_string())
            }
            ServerError::Upstream(msg) => {
                error!(error = %msg, "Proxy upstream error");
                (StatusCode::BAD_GATEWAY, format!("Upstream unavailable: {}", msg))
            }
            ServerError::Bind { addr, source } => {
                error!(%addr, error = %source, "Bind error surfaced in a request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ServerError::Internal(msg) => {
                error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        if status.is_server_error() {
            error!("Responding with status {}: {}", status, error_message);
        } else {
            tracing::debug!("Responding with status {}: {}", status, error_message);
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Define a Result type alias for handler functions
pub type ServerResult<T> = Result<T, ServerError>;
