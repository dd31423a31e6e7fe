//! Server error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pairlink_core::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the pairlink server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No API route at this path
    #[error("no route for {0}")]
    RouteNotFound(String),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Session already has a live transport
    #[error("session already active: {0}")]
    AlreadyActive(String),

    /// Transport could not be started
    #[error("failed to start transport: {0}")]
    StartFailed(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ServerError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyActive(_) => StatusCode::CONFLICT,
            Self::Bind { .. } | Self::StartFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to HTTP callers
    fn public_message(&self) -> String {
        match self {
            Self::RouteNotFound(_) => "Not found".to_string(),
            Self::SessionNotFound(_) => "Session not found".to_string(),
            Self::AlreadyActive(_) => "Session already started".to_string(),
            Self::StartFailed(_) => "Failed to start transport".to_string(),
            Self::Bind { .. } | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotFound(id) => Self::SessionNotFound(id),
            SessionError::AlreadyActive(id) => Self::AlreadyActive(id),
            e @ SessionError::TransportInstantiation { .. } => Self::StartFailed(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
