use log::{info, warn};
use std::sync::Arc;

use super::{Classifier, ModerationVerdict};

#[derive(Debug, Clone, PartialEq)]
pub enum GateResult {
    /// Every field passed (or could not be scored under the fail-open policy).
    Accept { verdicts: Vec<ModerationVerdict> },
    /// The first field that violated the policy. `score` is `None` only when a
    /// fail-closed gate rejected a field the classifier could not score.
    Reject { field_name: String, score: Option<f64> },
}

impl GateResult {
    #[cfg(test)]
    pub fn is_accept(&self) -> bool {
        matches!(self, GateResult::Accept { .. })
    }
}

/// Threshold policy over a sequence of named text fields.
pub struct ModerationGate {
    classifier: Arc<dyn Classifier>,
    threshold: f64,
    fail_closed: bool,
}

impl ModerationGate {
    pub fn new(classifier: Arc<dyn Classifier>, threshold: f64) -> Self {
        Self {
            classifier,
            threshold,
            fail_closed: false,
        }
    }

    pub fn fail_closed(mut self, fail_closed: bool) -> Self {
        self.fail_closed = fail_closed;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classifies fields in order and stops at the first rejection.
    pub async fn evaluate<N, T>(&self, fields: &[(N, T)]) -> GateResult
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let mut verdicts = Vec::with_capacity(fields.len());

        for (name, text) in fields {
            let name = name.as_ref();
            match self.classifier.classify(text.as_ref()).await {
                Ok(score) if score > self.threshold => {
                    info!(
                        "Rejected field '{}' with toxicity {:.3} (threshold {:.3})",
                        name, score, self.threshold
                    );
                    return GateResult::Reject {
                        field_name: name.to_string(),
                        score: Some(score),
                    };
                }
                Ok(score) => verdicts.push(ModerationVerdict {
                    field_name: name.to_string(),
                    score: Some(score),
                    passed: true,
                }),
                Err(e) if self.fail_closed => {
                    warn!("Classifier failed for field '{}', rejecting: {}", name, e);
                    return GateResult::Reject {
                        field_name: name.to_string(),
                        score: None,
                    };
                }
                Err(e) => {
                    warn!("Classifier failed for field '{}', accepting unscored: {}", name, e);
                    verdicts.push(ModerationVerdict {
                        field_name: name.to_string(),
                        score: None,
                        passed: true,
                    });
                }
            }
        }

        GateResult::Accept { verdicts }
    }
}
