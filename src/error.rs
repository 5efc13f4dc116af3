use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde_json::json;
use thiserror::Error;

/// Failure to obtain a toxicity score. Absorbed by the moderation gate.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(String),

    #[error("classifier request timed out")]
    Timeout,

    #[error("classifier rejected credentials (status {0})")]
    Unauthenticated(u16),

    #[error("classifier returned status {0}")]
    Status(u16),

    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifierError::Timeout
        } else if err.is_decode() {
            ClassifierError::MalformedResponse(err.to_string())
        } else {
            ClassifierError::Transport(err.to_string())
        }
    }
}

/// Quality-control verification failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("question text has no quoted answer")]
    AnswerFormat,

    #[error("quoted answer \"{0}\" does not match any option")]
    CorrectAnswerNotFound(String),

    #[error("invalid submission {0:?}: expected an option number from 1 to 4")]
    InvalidSubmission(String),
}

/// Stored data that violates the option-number invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIntegrityError {
    #[error("option number {0} is outside 1-4")]
    OptionOutOfRange(i64),

    #[error("stored response is not an integer")]
    NotAnInteger,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("record not found")]
    NotFound,

    #[error("response already recorded for this user and poll")]
    DuplicateResponse,

    #[error("referenced user or poll does not exist")]
    ForeignKey,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{field} contains inappropriate content. Please rephrase.")]
    Rejected { field: String, score: Option<f64> },

    #[error("{0}")]
    Authoring(VerifyError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AppError::NotFound("Poll not found.".to_string()),
            DbError::DuplicateResponse => {
                AppError::Conflict("Response already exists for this user and poll.".to_string())
            }
            DbError::ForeignKey => {
                AppError::BadRequest("Referenced user or poll does not exist.".to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidSubmission(_) => AppError::BadRequest(err.to_string()),
            authoring => AppError::Authoring(authoring),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            AppError::Conflict(_) => (StatusCode::CONFLICT, json!({ "error": self.to_string() })),
            AppError::Rejected { field, score } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.to_string(), "field": field, "toxicity_score": score }),
            ),
            AppError::Authoring(inner) => {
                let kind = match inner {
                    VerifyError::AnswerFormat => "answer_format",
                    VerifyError::CorrectAnswerNotFound(_) => "correct_answer_not_found",
                    VerifyError::InvalidSubmission(_) => "invalid_submission",
                };
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": format!("Quality-control poll is malformed: {}", inner), "kind": kind }),
                )
            }
            AppError::Internal(detail) => {
                error!("Internal error while handling request: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal server error." }))
            }
        };

        (status, Json(body)).into_response()
    }
}
