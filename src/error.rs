use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// JSON error payload: a message fit for display plus a stable kind.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

pub(crate) fn error_response(status: StatusCode, code: &'static str, message: String) -> axum::response::Response {
    (status, Json(ErrorBody { error: message, code })).into_response()
}
