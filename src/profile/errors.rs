use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::error::error_response;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl ProfileError {
    pub fn code(&self) -> &'static str {
        match self {
            ProfileError::Storage(_) => "STORAGE",
        }
    }
}

impl From<anyhow::Error> for ProfileError {
    fn from(e: anyhow::Error) -> Self {
        ProfileError::Storage(format!("{e:#}"))
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> Response {
        error!(error = %self, "profile request failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, self.code(), self.to_string())
    }
}
