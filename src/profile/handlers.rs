use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    profile::{
        dto::{AddReminderRequest, RecordQuestionRequest, SaveTipRequest},
        errors::ProfileError,
        repo_types::{Profile, ProfileSummary},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile/summary", get(get_summary))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/questions", post(record_question).delete(clear_questions))
        .route("/profile/tips", post(save_tip))
        .route("/profile/tips/:id", delete(remove_tip))
        .route("/profile/tasks/:id/toggle", post(toggle_task))
        .route("/profile/reminders", post(add_reminder))
        .route("/profile/reminders/:id", delete(remove_reminder))
}

type ProfileResult<T> = Result<Json<T>, ProfileError>;

#[instrument(skip(state))]
pub async fn get_profile(State(state): State<AppState>) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.profile().await?))
}

#[instrument(skip(state))]
pub async fn get_summary(State(state): State<AppState>) -> ProfileResult<ProfileSummary> {
    Ok(Json(state.profiles.summary().await?))
}

#[instrument(skip(state, body))]
pub async fn record_question(
    State(state): State<AppState>,
    Json(body): Json<RecordQuestionRequest>,
) -> ProfileResult<Profile> {
    let profile = state
        .profiles
        .record_question(&body.prompt, &body.answer)
        .await?;
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn clear_questions(State(state): State<AppState>) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.clear_questions().await?))
}

#[instrument(skip(state, body))]
pub async fn save_tip(
    State(state): State<AppState>,
    Json(body): Json<SaveTipRequest>,
) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.save_tip(&body.title, &body.content).await?))
}

#[instrument(skip(state))]
pub async fn remove_tip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.remove_tip(&id).await?))
}

#[instrument(skip(state))]
pub async fn toggle_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.toggle_task(&id).await?))
}

#[instrument(skip(state, body))]
pub async fn add_reminder(
    State(state): State<AppState>,
    Json(body): Json<AddReminderRequest>,
) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.add_reminder(&body.message).await?))
}

#[instrument(skip(state))]
pub async fn remove_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ProfileResult<Profile> {
    Ok(Json(state.profiles.remove_reminder(&id).await?))
}
