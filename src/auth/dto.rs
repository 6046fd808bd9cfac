use serde::{Deserialize, Serialize};

use crate::session::SessionUser;

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after login or signup.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: SessionUser,
}

/// Current session as the client sees it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}
