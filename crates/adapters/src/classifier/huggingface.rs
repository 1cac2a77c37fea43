//! Hugging Face inference API adapter

use async_trait::async_trait;
use feedwatch_domain::{Classification, Classifier, ClassifyError, SentimentLabel};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ClassifierConfig;

/// Text-classification model served by the Hugging Face inference API
pub struct HuggingFaceClassifier {
    client: Client,
    api_key: SecretString,
    config: ClassifierConfig,
}

impl HuggingFaceClassifier {
    pub fn new(api_key: SecretString, config: ClassifierConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            config,
        }
    }

    async fn call_api(&self, text: &str) -> Result<Classification, ClassifyError> {
        let url = format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&InferenceRequest { inputs: text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::Timeout
                } else {
                    ClassifyError::Api(e.to_string())
                }
            })?;

        if response.status() == 429 {
            return Err(ClassifyError::RateLimited);
        }

        if response.status() == 401 || response.status() == 403 {
            return Err(ClassifyError::Config("Invalid Hugging Face API key".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClassifyError::InvalidFormat(e.to_string()))?;

        parse_inference_response(&body)
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    /// One list of candidate labels per input
    Batched(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
    Error { error: String },
}

/// Take the first candidate label of the response
fn parse_inference_response(body: &str) -> Result<Classification, ClassifyError> {
    let response: InferenceResponse =
        serde_json::from_str(body).map_err(|e| ClassifyError::InvalidFormat(e.to_string()))?;

    let top = match response {
        InferenceResponse::Batched(batches) => batches
            .into_iter()
            .next()
            .and_then(|labels| labels.into_iter().next()),
        InferenceResponse::Flat(labels) => labels.into_iter().next(),
        InferenceResponse::Error { error } => return Err(ClassifyError::Api(error)),
    };

    let top = top.ok_or_else(|| ClassifyError::InvalidFormat("No labels returned".to_string()))?;

    Ok(Classification::new(
        SentimentLabel::from_raw(&top.label),
        top.score,
    ))
}

const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential retry delay starting at one second, capped at 30 seconds
fn backoff(attempt: u32) -> Duration {
    let millis = 2_u64.saturating_pow(attempt).saturating_mul(500);
    Duration::from_millis(millis.min(MAX_BACKOFF_MS))
}

#[async_trait]
impl Classifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let mut last_error = None;
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tracing::warn!(attempt = attempt, "Retrying classification");
                tokio::time::sleep(backoff(attempt)).await;
            }

            match self.call_api(text).await {
                Ok(classification) => return Ok(classification),
                Err(e @ ClassifyError::Config(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        model = %self.config.model,
                        "Classification attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClassifyError::Api("Unknown error".to_string())))
    }
}
