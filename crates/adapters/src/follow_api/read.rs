//! HTTP follow-list source

use async_trait::async_trait;
use feedwatch_domain::{FollowSource, Item, SourceError};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

/// Pages fetched per subject before the list is considered complete
const DEFAULT_MAX_PAGES: usize = 50;

/// Follow-list source backed by a paginated JSON API.
///
/// `GET {base_url}/users/{subject}/following[?cursor=...]` is expected to
/// answer with `{"users": [{"username": "..."}], "next_cursor": "..."}`.
pub struct HttpFollowSource {
    client: Client,
    token: Option<SecretString>,
    base_url: String,
    max_pages: usize,
    enabled: bool,
}

impl HttpFollowSource {
    pub fn new(base_url: String, token: Option<SecretString>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            enabled: true,
        }
    }

    /// Create a disabled source; every lookup fails with `SourceError::Disabled`
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            token: None,
            base_url: String::new(),
            max_pages: 0,
            enabled: false,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_page(
        &self,
        subject: &str,
        cursor: Option<&str>,
    ) -> Result<FollowingPage, SourceError> {
        let url = format!("{}/users/{}/following", self.base_url, subject);

        let mut request = self.client.get(&url);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        if let Some(token) = &self.token {
            request = request.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Network(format!("Timed out fetching follow list of {}", subject))
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        let response = check_status(response, subject).await?;

        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

async fn check_status(response: Response, subject: &str) -> Result<Response, SourceError> {
    let status = response.status();

    if status == 401 || status == 403 {
        return Err(SourceError::Auth("Invalid follow API token".to_string()));
    }

    if status == 404 {
        return Err(SourceError::NotFound(subject.to_string()));
    }

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(SourceError::RateLimited(retry_after));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Api(format!(
            "Follow API returned {}: {}",
            status, body
        )));
    }

    Ok(response)
}

#[derive(Deserialize)]
struct FollowingPage {
    #[serde(default)]
    users: Vec<Account>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Account {
    username: String,
}

#[async_trait]
impl FollowSource for HttpFollowSource {
    async fn fetch_follow_list(&self, subject: &str) -> Result<Vec<Item>, SourceError> {
        if !self.enabled {
            return Err(SourceError::Disabled);
        }

        tracing::info!(subject = %subject, "Fetching follow list");

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.max_pages {
            let response = self.fetch_page(subject, cursor.as_deref()).await?;

            items.extend(
                response
                    .users
                    .into_iter()
                    .map(|a| a.username.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .map(Item::account),
            );

            cursor = response.next_cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        if cursor.is_some() {
            tracing::warn!(
                subject = %subject,
                pages = self.max_pages,
                "Follow list truncated at page limit"
            );
        }

        tracing::info!(subject = %subject, count = items.len(), "Fetched follow list");

        Ok(items)
    }
}
