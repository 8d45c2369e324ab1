//! Error types for the HTTP server.

use std::net::SocketAddr;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use certmgr_service::Error as ServiceError;
use certmgr_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by the server, at startup or per request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A lifecycle operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The record store could not be opened.
    #[error("failed to open record store: {0}")]
    Storage(#[from] StoreError),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Status for a client that went away before the response was ready.
const CLIENT_CLOSED_REQUEST: u16 = 499;

impl ServerError {
    /// HTTP status and machine-readable kind for this error.
    #[must_use]
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Service(err) => (service_status(err), err.kind()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Storage(_) | Self::BindFailed(_, _) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

fn service_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidRequest(_)
        | ServiceError::UnsupportedKeyType(_)
        | ServiceError::UnsupportedCurve(_)
        | ServiceError::IssuerNotCa(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound { .. } | ServiceError::IssuerNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::DuplicateRoot { .. } | ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Canceled { .. } => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        if status.is_server_error() {
            error!(error = %self, kind = error_type, "request failed");
        } else {
            debug!(error = %self, kind = error_type, "request rejected");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
