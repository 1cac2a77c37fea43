//! News feed adapters

mod rss;

pub use rss::{FeedConfig, RssNewsSource};

use async_trait::async_trait;
use feedwatch_domain::{Item, NewsSource, SourceError};

/// Stub news source for testing and offline runs
pub struct StubNewsSource {
    items: Vec<Item>,
}

impl StubNewsSource {
    /// Create an empty stub; runs against it end with no data
    pub fn empty() -> Self {
        Self { items: vec![] }
    }

    /// Create a stub with predefined items
    pub fn with_items(items: Vec<Item>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl NewsSource for StubNewsSource {
    async fn fetch_news_snapshot(&self) -> Result<Vec<Item>, SourceError> {
        Ok(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_returns_items_in_order() {
        let source = StubNewsSource::with_items(vec![
            Item::article("Gold rallies", "https://example.com/1", "Wire"),
            Item::article("Stocks slip", "https://example.com/2", "Wire"),
        ]);

        let items = source.fetch_news_snapshot().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "https://example.com/1");

        assert!(StubNewsSource::empty().fetch_news_snapshot().await.unwrap().is_empty());
    }
}
