pub mod client;
pub mod gate;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ClassifierError;

pub use client::PerspectiveClient;
pub use gate::{GateResult, ModerationGate};

/// Scores text for toxicity on a 0.0 to 1.0 scale.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<f64, ClassifierError>;
}

/// Outcome of moderating a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationVerdict {
    pub field_name: String,
    /// Absent when the classifier could not score the field.
    pub score: Option<f64>,
    pub passed: bool,
}
