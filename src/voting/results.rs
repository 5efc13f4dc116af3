use serde::Serialize;

use super::tally::TallyResult;
use crate::models::{OptionNumber, Poll};

/// Label for a counted option whose slot holds no text.
pub const UNKNOWN_OPTION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub question_id: i64,
    pub question: String,
    pub options: Vec<OptionResult>,
    pub total: u64,
    pub winner: Option<WinnerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionResult {
    pub option_number: OptionNumber,
    pub text: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerView {
    pub option_number: OptionNumber,
    pub text: String,
    pub count: u64,
}

/// Builds the per-option results for a poll.
///
/// Empty slots are only listed when responses point at them, labelled
/// [`UNKNOWN_OPTION`]. A poll without responses reports zero counts.
pub fn compose(poll: &Poll, tally: Option<&TallyResult>) -> ResultsView {
    let count_of = |option: OptionNumber| tally.map(|t| t.count(option)).unwrap_or(0);

    let options = OptionNumber::ALL
        .into_iter()
        .filter_map(|option| {
            let count = count_of(option);
            match poll.option_text(option) {
                Some(text) => Some(OptionResult {
                    option_number: option,
                    text: text.to_string(),
                    count,
                }),
                None if count > 0 => Some(OptionResult {
                    option_number: option,
                    text: UNKNOWN_OPTION.to_string(),
                    count,
                }),
                None => None,
            }
        })
        .collect();

    ResultsView {
        question_id: poll.id,
        question: poll.question.clone(),
        options,
        total: tally.map(TallyResult::total).unwrap_or(0),
        winner: tally.map(|t| winner_view(poll, t)),
    }
}

pub fn winner_view(poll: &Poll, tally: &TallyResult) -> WinnerView {
    WinnerView {
        option_number: tally.winning_option,
        text: option_label(poll, tally.winning_option),
        count: tally.winning_count,
    }
}

fn option_label(poll: &Poll, option: OptionNumber) -> String {
    poll.option_text(option)
        .unwrap_or(UNKNOWN_OPTION)
        .to_string()
}
