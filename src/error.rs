//! Crate-wide error type.
//!
//! Synchronous failures (validation, config, routing) surface directly to the
//! caller; everything that happens inside an accepted job is rendered into a
//! [`JobMessage::Error`](crate::types::JobMessage) by the dispatcher instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::types::AnalysisKind;

/// Errors produced by codescope.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Malformed or incomplete submission. No job is created.
    #[error("{0}")]
    Validation(String),

    /// The source text is not valid Python.
    #[error("{0}")]
    Parse(String),

    /// The analysis kind is recognised but has no implementation yet.
    #[error("{} analysis not implemented", .0.display_name())]
    NotImplemented(AnalysisKind),

    /// Unexpected fault inside a worker or a handler.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid configuration values.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

impl AnalyzerError {
    /// HTTP status for errors that are reported synchronously.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Parse(_) | Self::NotImplemented(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) | Self::Config(_) | Self::Io(_) | Self::Yaml(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AnalyzerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
