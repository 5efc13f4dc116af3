use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DataIntegrityError;

/// Author id reserved for quality-control polls.
pub const QUALITY_CONTROL_AUTHOR_ID: i64 = 0;

/// Every poll has exactly four option slots, numbered 1 through 4.
pub const OPTION_SLOTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub author_id: i64,
    pub question: String,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub options: [Option<String>; OPTION_SLOTS],
}

impl Poll {
    pub fn is_quality_control(&self) -> bool {
        self.author_id == QUALITY_CONTROL_AUTHOR_ID
    }

    /// Text of an option slot, if the slot holds non-empty text.
    pub fn option_text(&self, option: OptionNumber) -> Option<&str> {
        self.options[option.index()]
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// A poll as submitted for creation, before it has an id.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub author_id: i64,
    pub question: String,
    pub description: Option<String>,
    pub start_time: String,
    pub options: [Option<String>; OPTION_SLOTS],
}

impl NewPoll {
    /// Named text fields in the order they go through moderation.
    pub fn moderated_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![("question".to_string(), self.question.clone())];
        if let Some(description) = &self.description {
            fields.push(("description".to_string(), description.clone()));
        }
        for (i, option) in self.options.iter().enumerate() {
            if let Some(text) = option {
                fields.push((format!("response{}", i + 1), text.clone()));
            }
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: i64,
    pub question_id: i64,
    pub option: OptionNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// A response option number, guaranteed to be within 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct OptionNumber(u8);

impl OptionNumber {
    pub const ALL: [OptionNumber; OPTION_SLOTS] =
        [OptionNumber(1), OptionNumber(2), OptionNumber(3), OptionNumber(4)];

    pub fn new(value: i64) -> Option<Self> {
        match value {
            1..=4 => Some(Self(value as u8)),
            _ => None,
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot index.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl TryFrom<i64> for OptionNumber {
    type Error = DataIntegrityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(DataIntegrityError::OptionOutOfRange(value))
    }
}

impl From<OptionNumber> for i64 {
    fn from(option: OptionNumber) -> Self {
        option.0 as i64
    }
}

impl fmt::Display for OptionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
