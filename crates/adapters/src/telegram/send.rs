//! Telegram Bot API adapter for sending messages

use async_trait::async_trait;
use feedwatch_domain::{
    DeliveryChannel, DeliveryError, DeliveryTarget, MessageFormat, OutboundMessage,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram channel delivering to chat ids
pub struct TelegramChannel {
    client: Client,
    bot_token: SecretString,
    base_url: String,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, "https://api.telegram.org".to_string(), 30)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            bot_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send_message(
        &self,
        target: &DeliveryTarget,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: target.as_str(),
            text: &message.text,
            parse_mode: match message.format {
                MessageFormat::Markdown => Some("Markdown"),
                MessageFormat::Plain => None,
            },
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    // reqwest errors carry the URL, which embeds the token
                    DeliveryError::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();

        if status.is_success() && body.as_ref().is_none_or(|b| b.ok) {
            tracing::debug!(delivery_target = %target, "Message delivered");
            return Ok(());
        }

        let description = body
            .as_ref()
            .and_then(|b| b.description.clone())
            .unwrap_or_else(|| status.to_string());

        if status == 401 || status == 404 {
            return Err(DeliveryError::Auth(description));
        }

        if status == 429 {
            let retry_after = body
                .and_then(|b| b.parameters)
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            return Err(DeliveryError::RateLimited(retry_after));
        }

        if status == 400 || status == 403 {
            return Err(DeliveryError::Rejected(description));
        }

        Err(DeliveryError::Api(format!(
            "Telegram returned {}: {}",
            status, description
        )))
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
