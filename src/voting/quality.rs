use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::VerifyError;
use crate::models::{OPTION_SLOTS, OptionNumber};

lazy_static! {
    /// First double-quoted span, scanning left to right.
    static ref QUOTED_ANSWER: Regex = Regex::new(r#""([^"]*)""#).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    Correct,
    Incorrect { correct_option: OptionNumber },
}

impl VerifyResult {
    pub fn is_correct(&self) -> bool {
        matches!(self, VerifyResult::Correct)
    }
}

/// Checks a quality-control submission against the answer quoted in the question.
///
/// Authoring defects in the poll (no quoted answer, or a quoted answer that is
/// not one of the options) are reported before the submission is looked at, so
/// they are never mistaken for a wrong answer.
pub fn verify(
    question: &str,
    options: &[Option<String>; OPTION_SLOTS],
    submitted: i64,
) -> Result<VerifyResult, VerifyError> {
    let correct_option = correct_option(question, options)?;

    let submitted = OptionNumber::new(submitted)
        .ok_or_else(|| VerifyError::InvalidSubmission(submitted.to_string()))?;

    if submitted == correct_option {
        Ok(VerifyResult::Correct)
    } else {
        Ok(VerifyResult::Incorrect { correct_option })
    }
}

/// Finds the option whose text matches the quoted answer, ignoring case and
/// surrounding whitespace.
pub fn correct_option(
    question: &str,
    options: &[Option<String>; OPTION_SLOTS],
) -> Result<OptionNumber, VerifyError> {
    let canonical = QUOTED_ANSWER
        .captures(question)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(VerifyError::AnswerFormat)?;
    let wanted = normalize(canonical);

    OptionNumber::ALL
        .into_iter()
        .find(|option| {
            options[option.index()]
                .as_deref()
                .is_some_and(|text| normalize(text) == wanted)
        })
        .ok_or_else(|| VerifyError::CorrectAnswerNotFound(canonical.trim().to_string()))
}

/// Extracts a submitted option number from a request value.
///
/// Only JSON integers are accepted; strings and floats are not coerced.
pub fn parse_submission(raw: &Value) -> Result<i64, VerifyError> {
    raw.as_i64()
        .ok_or_else(|| VerifyError::InvalidSubmission(raw.to_string()))
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
