use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::Classifier;
use crate::config::ModerationConfig;
use crate::error::ClassifierError;

/// Perspective API (`comments:analyze`) TOXICITY classifier.
pub struct PerspectiveClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    attribute_scores: AttributeScores,
}

#[derive(Deserialize)]
struct AttributeScores {
    #[serde(rename = "TOXICITY")]
    toxicity: AttributeScore,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Deserialize)]
struct SummaryScore {
    value: f64,
}

impl PerspectiveClient {
    pub fn new(config: &ModerationConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Classifier for PerspectiveClient {
    async fn classify(&self, text: &str) -> Result<f64, ClassifierError> {
        // Nothing to classify
        if text.trim().is_empty() {
            return Ok(0.0);
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClassifierError::Unauthenticated(StatusCode::UNAUTHORIZED.as_u16()))?;

        let body = json!({
            "comment": { "text": text },
            "requestedAttributes": { "TOXICITY": {} },
        });

        debug!("Requesting toxicity score for {} characters", text.len());
        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClassifierError::Unauthenticated(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let parsed: AnalyzeResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

        let score = parsed.attribute_scores.toxicity.summary_score.value;
        if !(0.0..=1.0).contains(&score) {
            return Err(ClassifierError::MalformedResponse(format!(
                "score {} is outside [0, 1]",
                score
            )));
        }

        Ok(score)
    }
}
