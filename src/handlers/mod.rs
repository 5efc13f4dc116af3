mod poll;
mod vote;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::db::Database;
use crate::error::AppError;
use crate::models::Poll;
use crate::moderation::ModerationGate;

/// Collaborators shared by every request.
pub struct AppState {
    pub database: Database,
    pub gate: ModerationGate,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    // The browser frontend sends its own headers on every call
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health))
        .route("/add-user", post(add_user))
        .route("/add-poll", post(poll::add_poll))
        .route("/get-polls", get(poll::get_polls))
        .route("/get-poll/:questionid", get(poll::get_poll))
        .route("/get-poll-results/:questionid", get(poll::get_poll_results))
        .route("/max-response-per-question", get(poll::max_response_per_question))
        .route("/add-response", post(vote::add_response))
        .route("/get-random-quality-control-poll", get(vote::get_random_quality_control_poll))
        .route("/check-quality-control-response", post(vote::check_quality_control_response))
        .layer(cors)
        .with_state(state)
}

/// Poll as exposed over the wire, one field per option slot.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollPayload {
    pub questionid: i64,
    pub authorid: i64,
    pub question: String,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub response1: Option<String>,
    pub response2: Option<String>,
    pub response3: Option<String>,
    pub response4: Option<String>,
}

impl From<Poll> for PollPayload {
    fn from(poll: Poll) -> Self {
        let [response1, response2, response3, response4] = poll.options;
        Self {
            questionid: poll.id,
            authorid: poll.author_id,
            question: poll.question,
            description: poll.description,
            start_time: poll.start_time,
            response1,
            response2,
            response3,
            response4,
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct AddUserRequest {
    username: Option<String>,
}

async fn add_user(
    State(state): State<SharedState>,
    Json(payload): Json<AddUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Validate the username
    let username = payload
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("Username is required.".to_string()))?;

    // Store the user
    let user = state.database.create_user(&username).await?;
    info!("Created user {} ({})", user.id, user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User added successfully!", "userid": user.id, "username": user.username })),
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::moderation::gate::tests::ScriptedClassifier;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    pub(crate) async fn state_with(classifier: Arc<ScriptedClassifier>) -> SharedState {
        let database = Database::in_memory().await.unwrap();
        let gate = ModerationGate::new(classifier, 0.7);
        Arc::new(AppState { database, gate })
    }

    pub(crate) async fn state() -> SharedState {
        state_with(Arc::new(ScriptedClassifier::new(&[]))).await
    }

    pub(crate) async fn send(
        state: &SharedState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub(crate) async fn add_user(state: &SharedState, name: &str) -> i64 {
        let (status, body) = send(state, "POST", "/add-user", Some(json!({ "username": name }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["userid"].as_i64().unwrap()
    }

    pub(crate) async fn add_poll(state: &SharedState, body: Value) -> i64 {
        let (status, body) = send(state, "POST", "/add-poll", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["questionid"].as_i64().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn health_reports_ok() {
        let state = state().await;
        let (status, body) = send(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn user_requires_a_name() {
        let state = state().await;
        let (status, body) = send(&state, "POST", "/add-user", Some(json!({ "username": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username is required.");
    }

    #[tokio::test]
    async fn users_get_sequential_ids() {
        let state = state().await;
        let first = add_user(&state, "alice").await;
        let second = add_user(&state, "bob").await;
        assert!(second > first);
    }

    #[tokio::test]
    async fn preflight_allows_frontend_headers() {
        use axum::body::Body;
        use axum::http::{Request, header};
        use tower::ServiceExt;

        let state = state().await;
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/get-polls")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                "access-control-allow-origin,content-type",
            )
            .body(Body::empty())
            .unwrap();

        let response = super::build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }
}
