use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::auth::repo::USERS_KEY;
use crate::state::AppState;
use crate::storage::KvStore;
use crate::{auth, profile};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(profile::router())
                .route("/health", get(health)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

// Reads one known key so a dead database or unreadable data dir shows up here.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let storage = format!("{:?}", state.config.storage).to_lowercase();
    match state.store.get(USERS_KEY).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok", "storage": storage }))),
        Err(e) => {
            error!(error = %e, "health check could not read storage");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "storage": storage })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake().await);
        let (status, body) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "storage": "memory" }));
    }

    #[tokio::test]
    async fn signup_login_logout_flow() {
        let app = build_app(AppState::fake().await);

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/signup",
            Some(json!({"name": "Alice", "email": "Alice@Example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, body) = call(&app, "POST", "/api/auth/logout", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (_, session) = call(&app, "GET", "/api/auth/session", None).await;
        assert_eq!(session["isAuthenticated"], false);
        assert_eq!(session["user"], Value::Null);

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            Some(json!({"email": "alice@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Alice");
        assert_eq!(body["user"]["email"], "alice@example.com");

        let (_, session) = call(&app, "GET", "/api/auth/session", None).await;
        assert_eq!(session["isAuthenticated"], true);
        assert_eq!(session["isLoading"], false);
    }

    #[tokio::test]
    async fn auth_errors_carry_kind_and_status() {
        let app = build_app(AppState::fake().await);
        let signup = json!({"name": "Bo", "email": "bo@example.com", "password": "password123"});
        call(&app, "POST", "/api/auth/signup", Some(signup.clone())).await;

        let (status, body) = call(&app, "POST", "/api/auth/signup", Some(signup)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "EMAIL_IN_USE");

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            Some(json!({"email": "bo@example.com", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
        assert_eq!(body["error"], "Invalid email or password.");

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/signup",
            Some(json!({"name": "Cy", "email": "cy@example.com", "password": "short"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn profile_routes_follow_the_session() {
        let state = AppState::fake().await;
        let app = build_app(state.clone());

        let (status, anon) = call(&app, "GET", "/api/profile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(anon["tasks"].as_array().unwrap().len(), 3);
        assert_eq!(anon["reminders"].as_array().unwrap().len(), 2);

        let (_, body) = call(
            &app,
            "POST",
            "/api/auth/signup",
            Some(json!({"name": "Dee", "email": "dee@example.com", "password": "password123"})),
        )
        .await;
        let user_id = body["user"]["id"].as_str().unwrap().to_string();

        let (_, profile) = call(
            &app,
            "POST",
            "/api/profile/questions",
            Some(json!({"prompt": "Best time to prune?", "answer": "Late winter."})),
        )
        .await;
        assert_eq!(profile["questionsHistory"][0]["prompt"], "Best time to prune?");

        let (_, profile) = call(
            &app,
            "POST",
            "/api/profile/tips",
            Some(json!({"title": "", "content": "Late winter."})),
        )
        .await;
        let tip_id = profile["savedTips"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(profile["savedTips"][0]["title"], "Saved answer");

        let (_, profile) = call(&app, "POST", "/api/profile/tasks/task-1/toggle", None).await;
        assert_eq!(profile["tasks"][0]["completed"], true);

        let (_, profile) = call(
            &app,
            "POST",
            "/api/profile/reminders",
            Some(json!({"message": "  Book the vet  "})),
        )
        .await;
        let reminder_id = profile["reminders"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(profile["reminders"][0]["message"], "Book the vet");

        let (_, summary) = call(&app, "GET", "/api/profile/summary", None).await;
        assert_eq!(summary["questionsAsked"], 1);
        assert_eq!(summary["savedTips"], 1);
        assert_eq!(summary["openTasks"], 2);

        let (_, profile) = call(&app, "DELETE", &format!("/api/profile/tips/{tip_id}"), None).await;
        assert!(profile["savedTips"].as_array().unwrap().is_empty());
        let (_, profile) =
            call(&app, "DELETE", &format!("/api/profile/reminders/{reminder_id}"), None).await;
        assert_eq!(profile["reminders"].as_array().unwrap().len(), 2);
        let (_, profile) = call(&app, "DELETE", "/api/profile/questions", None).await;
        assert!(profile["questionsHistory"].as_array().unwrap().is_empty());

        let stored = state
            .store
            .get(&format!("pris.userData.{user_id}"))
            .await
            .unwrap()
            .expect("profile persisted for signed-in user");
        assert!(stored.contains("\"completed\":true"));

        call(&app, "POST", "/api/auth/logout", None).await;
        let (_, anon) = call(&app, "GET", "/api/profile", None).await;
        assert_eq!(anon["tasks"][0]["completed"], false);
    }
}
