use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SessionResponse, SignupRequest},
        errors::AuthError,
        services::SignupInput,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let user = state
        .auth
        .signup(SignupInput {
            name: payload.name,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    rebind_profile(&state).await;
    Ok((StatusCode::CREATED, Json(AuthResponse { user })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let user = state.auth.login(&payload.email, &payload.password).await?;
    rebind_profile(&state).await;
    Ok(Json(AuthResponse { user }))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.auth.logout().await;
    rebind_profile(&state).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip(state))]
pub async fn session(State(state): State<AppState>) -> Json<SessionResponse> {
    let user = state.auth.current().await;
    Json(SessionResponse {
        is_authenticated: user.is_some(),
        is_loading: state.auth.is_loading(),
        user,
    })
}

// The profile service re-syncs on its next call anyway; switching here just
// makes the transition happen at the moment the session changes.
async fn rebind_profile(state: &AppState) {
    if let Err(e) = state.profiles.rebind().await {
        warn!(error = %e, "profile rebind after session change failed");
    }
}
