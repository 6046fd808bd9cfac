use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::error::error_response;

/// Failures surfaced by login and signup.
///
/// Storage documents that fail to parse never show up here; they are
/// replaced with defaults where they are read.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("An account with this email already exists.")]
    EmailAlreadyInUse,
    #[error("{0}")]
    Validation(String),
    #[error("Secure password hashing is not available: {0}")]
    HashingUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Machine-readable kind, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailAlreadyInUse => "EMAIL_IN_USE",
            AuthError::Validation(_) => "VALIDATION",
            AuthError::HashingUnavailable(_) => "HASHING_UNAVAILABLE",
            AuthError::Storage(_) => "STORAGE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::HashingUnavailable(_) | AuthError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Storage(format!("{e:#}"))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "auth request failed");
        }
        error_response(status, self.code(), self.to_string())
    }
}
