use log::error;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::DataIntegrityError;
use crate::models::OptionNumber;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyResult {
    pub question_id: i64,
    /// Counts for every option that received at least one response.
    pub counts: BTreeMap<OptionNumber, u64>,
    pub winning_option: OptionNumber,
    pub winning_count: u64,
}

impl TallyResult {
    pub fn count(&self, option: OptionNumber) -> u64 {
        self.counts.get(&option).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Counts responses per option and picks the most chosen one.
///
/// Ties go to the lowest option number. Returns `None` for a poll with no
/// responses.
pub fn tally(question_id: i64, responses: &[OptionNumber]) -> Option<TallyResult> {
    let mut counts: BTreeMap<OptionNumber, u64> = BTreeMap::new();
    for option in responses {
        *counts.entry(*option).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending option order, so only a strictly larger
    // count replaces the current leader.
    let mut winner: Option<(OptionNumber, u64)> = None;
    for (option, count) in &counts {
        match winner {
            Some((_, best)) if *count <= best => {}
            _ => winner = Some((*option, *count)),
        }
    }

    winner.map(|(winning_option, winning_count)| TallyResult {
        question_id,
        counts,
        winning_option,
        winning_count,
    })
}

/// Converts stored option numbers for a poll, logging and excluding any
/// outside 1-4 so a corrupt row cannot take down the aggregation.
///
/// `None` marks a stored value that was not an integer at all.
pub fn valid_responses(question_id: i64, raw: &[Option<i64>]) -> Vec<OptionNumber> {
    raw.iter()
        .filter_map(|value| {
            match value
                .ok_or(DataIntegrityError::NotAnInteger)
                .and_then(OptionNumber::try_from)
            {
                Ok(option) => Some(option),
                Err(e) => {
                    error!("Data integrity violation in poll {}: {}", question_id, e);
                    None
                }
            }
        })
        .collect()
}
