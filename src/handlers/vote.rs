use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{PollPayload, SharedState};
use crate::error::AppError;
use crate::models::{OptionNumber, Response};
use crate::voting::{quality, verify};

#[derive(Deserialize)]
pub struct SubmitRequest {
    userid: Option<i64>,
    questionid: Option<i64>,
    #[serde(default)]
    response: Value,
}

impl SubmitRequest {
    fn ids(&self) -> Result<(i64, i64), AppError> {
        match (self.userid, self.questionid) {
            (Some(userid), Some(questionid)) => Ok((userid, questionid)),
            _ => Err(AppError::BadRequest(
                "User ID, Question ID, and Response are required.".to_string(),
            )),
        }
    }
}

pub async fn add_response(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (userid, questionid) = payload.ids()?;
    let option = quality::parse_submission(&payload.response)
        .ok()
        .and_then(OptionNumber::new)
        .ok_or_else(|| AppError::BadRequest("Invalid response option.".to_string()))?;

    let poll = state.database.get_poll(questionid).await?;
    if poll.option_text(option).is_none() {
        return Err(AppError::BadRequest(format!(
            "Poll {} has no response option {}.",
            questionid, option
        )));
    }

    state
        .database
        .create_response(&Response {
            user_id: userid,
            question_id: questionid,
            option,
        })
        .await?;
    info!("Recorded response {} from user {} on poll {}", option, userid, questionid);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Response added successfully!" })),
    ))
}

pub async fn get_random_quality_control_poll(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let poll = state
        .database
        .get_random_quality_control_poll()
        .await?
        .ok_or_else(|| AppError::NotFound("No quality control poll found.".to_string()))?;

    Ok(Json(PollPayload::from(poll)))
}

pub async fn check_quality_control_response(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (userid, questionid) = payload.ids()?;
    let poll = state.database.get_poll(questionid).await?;
    if !poll.is_quality_control() {
        return Err(AppError::BadRequest(format!(
            "Poll {} is not a quality control poll.",
            questionid
        )));
    }

    // A broken poll is reported before the submission is looked at
    let correct_option = quality::correct_option(&poll.question, &poll.options).map_err(|e| {
        warn!("Quality control poll {} is malformed: {}", questionid, e);
        AppError::from(e)
    })?;

    let submitted = quality::parse_submission(&payload.response)?;
    let result = verify(&poll.question, &poll.options, submitted)?;
    info!(
        "User {} answered quality control poll {} {}",
        userid,
        questionid,
        if result.is_correct() { "correctly" } else { "incorrectly" }
    );

    Ok(Json(json!({
        "is_correct": result.is_correct(),
        "correct_option": i64::from(correct_option),
    })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    async fn setup_poll(state: &crate::handlers::SharedState, author: i64, question: &str) -> i64 {
        add_poll(
            state,
            json!({
                "authorid": author,
                "question": question,
                "response1": "Breakfast",
                "response2": "Lunch",
                "response3": "Dinner",
                "response4": "Snacks"
            }),
        )
        .await
    }

    fn submission(user: i64, poll: i64, response: Value) -> Option<Value> {
        Some(json!({ "userid": user, "questionid": poll, "response": response }))
    }

    #[tokio::test]
    async fn second_response_conflicts() {
        let state = state().await;
        let user = add_user(&state, "alice").await;
        let poll = setup_poll(&state, user, "Favourite meal?").await;

        let (status, _) = send(&state, "POST", "/add-response", submission(user, poll, json!(1))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&state, "POST", "/add-response", submission(user, poll, json!(2))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn response_must_be_an_option_number() {
        let state = state().await;
        let user = add_user(&state, "alice").await;
        let poll = setup_poll(&state, user, "Favourite meal?").await;

        for bad in [json!(0), json!(5), json!("2"), Value::Null] {
            let (status, body) = send(&state, "POST", "/add-response", submission(user, poll, bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid response option.");
        }
    }

    #[tokio::test]
    async fn response_to_empty_slot_is_rejected() {
        let state = state().await;
        let user = add_user(&state, "alice").await;
        let poll = add_poll(
            &state,
            json!({ "authorid": user, "question": "Yes or no?", "response1": "Yes", "response2": "No" }),
        )
        .await;

        let (status, _) = send(&state, "POST", "/add-response", submission(user, poll, json!(3))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn response_to_unknown_poll_is_not_found() {
        let state = state().await;
        let user = add_user(&state, "alice").await;
        let (status, _) = send(&state, "POST", "/add-response", submission(user, 404, json!(1))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_ids_are_rejected() {
        let state = state().await;
        let (status, _) = send(&state, "POST", "/add-response", Some(json!({ "response": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn no_quality_control_poll_yet() {
        let state = state().await;
        let (status, body) = send(&state, "GET", "/get-random-quality-control-poll", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No quality control poll found.");
    }

    #[tokio::test]
    async fn quality_control_answers_are_checked() {
        let state = state().await;
        let voter = add_user(&state, "alice").await;
        let poll = setup_poll(&state, 0, "Pick \"Dinner\" as your answer").await;

        let (status, body) = send(&state, "GET", "/get-random-quality-control-poll", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["questionid"], poll);

        let (status, body) = send(
            &state,
            "POST",
            "/check-quality-control-response",
            submission(voter, poll, json!(3)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "is_correct": true, "correct_option": 3 }));

        let (status, body) = send(
            &state,
            "POST",
            "/check-quality-control-response",
            submission(voter, poll, json!(2)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "is_correct": false, "correct_option": 3 }));
    }

    #[tokio::test]
    async fn quality_control_rejects_invalid_submission() {
        let state = state().await;
        let voter = add_user(&state, "alice").await;
        let poll = setup_poll(&state, 0, "Pick \"Lunch\"").await;

        for bad in [json!(7), json!("2")] {
            let (status, _) = send(
                &state,
                "POST",
                "/check-quality-control-response",
                submission(voter, poll, bad),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn regular_poll_is_not_a_quality_check() {
        let state = state().await;
        let author = add_user(&state, "alice").await;
        let poll = setup_poll(&state, author, "Pick \"Lunch\"").await;

        let (status, _) = send(
            &state,
            "POST",
            "/check-quality-control-response",
            submission(author, poll, json!(2)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn legacy_poll_without_quotes_reports_authoring_error() {
        let state = state().await;
        let voter = add_user(&state, "alice").await;
        sqlx::query(
            "INSERT INTO polls (authorid, question, response1, response2) VALUES (0, 'Pick your answer', 'A', 'B')",
        )
        .execute(state.database.pool())
        .await
        .unwrap();

        let (status, body) = send(
            &state,
            "POST",
            "/check-quality-control-response",
            submission(voter, 1, json!(1)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "answer_format");
    }

    #[tokio::test]
    async fn malformed_poll_is_reported_before_bad_submission() {
        let state = state().await;
        let voter = add_user(&state, "alice").await;
        sqlx::query(
            "INSERT INTO polls (authorid, question, response1, response2) VALUES (0, 'Pick your answer', 'A', 'B')",
        )
        .execute(state.database.pool())
        .await
        .unwrap();

        for bad in [json!("1"), json!(9), Value::Null] {
            let (status, body) = send(
                &state,
                "POST",
                "/check-quality-control-response",
                submission(voter, 1, bad),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(body["kind"], "answer_format");
        }
    }
}
