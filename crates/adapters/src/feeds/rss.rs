//! RSS/Atom news source

use async_trait::async_trait;
use feedwatch_domain::{Item, NewsSource, SourceError};
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Feed list and fetch limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed URLs, fetched in order
    pub feeds: Vec<String>,
    /// Entries taken from the top of each feed
    pub items_per_feed: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feeds: vec![],
            items_per_feed: 10,
            timeout_secs: 30,
        }
    }
}

/// News source aggregating several RSS/Atom feeds
pub struct RssNewsSource {
    client: Client,
    config: FeedConfig,
}

impl RssNewsSource {
    pub fn new(config: FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("feedwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<Item>, SourceError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Network(format!("Timed out fetching {}", url))
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        if response.status() == 429 {
            return Err(SourceError::RateLimited(None));
        }

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Feed {} returned {}",
                url,
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        parse_feed(&body, self.config.items_per_feed)
    }
}

/// Parse a feed document into news items, keeping the first `limit` entries
fn parse_feed(body: &[u8], limit: usize) -> Result<Vec<Item>, SourceError> {
    let feed = feed_rs::parser::parse(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    let source = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Unknown Source".to_string());

    let items = feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            Item::article(title.trim(), link, source.as_str())
        })
        .collect();

    Ok(items)
}

#[async_trait]
impl NewsSource for RssNewsSource {
    async fn fetch_news_snapshot(&self) -> Result<Vec<Item>, SourceError> {
        if self.config.feeds.is_empty() {
            tracing::warn!("No news feeds configured");
            return Ok(vec![]);
        }

        let results = join_all(self.config.feeds.iter().map(|url| self.fetch_feed(url))).await;

        let mut items = Vec::new();
        let mut failures = 0;

        for (url, result) in self.config.feeds.iter().zip(results) {
            match result {
                Ok(feed_items) => {
                    tracing::debug!(feed = %url, count = feed_items.len(), "Fetched feed");
                    items.extend(feed_items);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(feed = %url, error = %e, "Skipping feed");
                }
            }
        }

        if failures == self.config.feeds.len() {
            return Err(SourceError::Network(format!(
                "All {} feeds failed",
                failures
            )));
        }

        tracing::info!(count = items.len(), failed_feeds = failures, "Fetched news");

        Ok(items)
    }
}
