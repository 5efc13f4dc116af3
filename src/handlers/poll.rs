use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::{PollPayload, SharedState};
use crate::error::{AppError, DbError};
use crate::models::{NewPoll, OptionNumber};
use crate::moderation::GateResult;
use crate::voting::{compose, quality, results, tally};

#[derive(Deserialize)]
pub struct AddPollRequest {
    authorid: Option<i64>,
    question: Option<String>,
    description: Option<String>,
    start_time: Option<String>,
    response1: Option<String>,
    response2: Option<String>,
    response3: Option<String>,
    response4: Option<String>,
}

impl AddPollRequest {
    fn into_new_poll(self) -> Result<NewPoll, AppError> {
        let author_id = self
            .authorid
            .ok_or_else(|| AppError::BadRequest("Author ID is required.".to_string()))?;
        let question = non_blank(self.question)
            .ok_or_else(|| AppError::BadRequest("Question is required.".to_string()))?;

        let options = [self.response1, self.response2, self.response3, self.response4].map(non_blank);
        if options.iter().all(Option::is_none) {
            return Err(AppError::BadRequest(
                "At least one response option is required.".to_string(),
            ));
        }

        Ok(NewPoll {
            author_id,
            question,
            description: non_blank(self.description),
            start_time: non_blank(self.start_time)
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%d %H:%M").to_string()),
            options,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn add_poll(
    State(state): State<SharedState>,
    Json(payload): Json<AddPollRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new_poll = payload.into_new_poll()?;

    // A quality-control poll is useless unless its quoted answer is one of the options
    if new_poll.author_id == crate::models::QUALITY_CONTROL_AUTHOR_ID {
        quality::correct_option(&new_poll.question, &new_poll.options).map_err(AppError::Authoring)?;
    }

    // Moderate every text field before anything is stored
    let fields = new_poll.moderated_fields();
    match state.gate.evaluate(fields.as_slice()).await {
        GateResult::Accept { verdicts } => {
            let unscored = verdicts.iter().filter(|v| v.score.is_none()).count();
            if unscored > 0 {
                warn!("{} field(s) of new poll accepted without a toxicity score", unscored);
            }
        }
        GateResult::Reject { field_name, score } => {
            return Err(AppError::Rejected { field: field_name, score });
        }
    }

    // Store the poll
    let questionid = state.database.create_poll(&new_poll).await?;
    info!("Created poll {} by author {}", questionid, new_poll.author_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Poll added successfully!", "questionid": questionid })),
    ))
}

pub async fn get_polls(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let polls: Vec<PollPayload> = state
        .database
        .get_polls()
        .await?
        .into_iter()
        .map(PollPayload::from)
        .collect();

    Ok(Json(polls))
}

pub async fn get_poll(
    State(state): State<SharedState>,
    Path(questionid): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let poll = state.database.get_poll(questionid).await?;
    Ok(Json(PollPayload::from(poll)))
}

pub async fn get_poll_results(
    State(state): State<SharedState>,
    Path(questionid): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let poll = state.database.get_poll(questionid).await?;
    let raw = state.database.get_poll_responses(questionid).await?;

    // Drop corrupt rows, then tally what is left
    let responses = tally::valid_responses(questionid, &raw);
    let tallied = tally::tally(questionid, &responses);

    Ok(Json(compose(&poll, tallied.as_ref())))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WinningResponse {
    pub response: WinningOption,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WinningOption {
    pub option_number: OptionNumber,
    pub text: String,
}

/// Winning option of every poll that has responses, keyed by question id.
pub async fn max_response_per_question(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    // Group raw responses by poll
    let mut grouped: BTreeMap<i64, Vec<Option<i64>>> = BTreeMap::new();
    for (questionid, response) in state.database.get_all_responses().await? {
        grouped.entry(questionid).or_default().push(response);
    }

    // Tally each poll and look up the winning option's text
    let mut winners = BTreeMap::new();
    for (questionid, raw) in grouped {
        let responses = tally::valid_responses(questionid, &raw);
        let Some(tallied) = tally::tally(questionid, &responses) else {
            continue;
        };

        let text = match state.database.get_poll(questionid).await {
            Ok(poll) => results::winner_view(&poll, &tallied).text,
            Err(DbError::NotFound) => results::UNKNOWN_OPTION.to_string(),
            Err(e) => return Err(e.into()),
        };

        winners.insert(
            tallied.question_id,
            WinningResponse {
                response: WinningOption {
                    option_number: tallied.winning_option,
                    text,
                },
                count: tallied.winning_count,
            },
        );
    }

    Ok(Json(winners))
}
