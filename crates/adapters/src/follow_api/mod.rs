//! Follow-list source adapters

mod read;

pub use read::HttpFollowSource;

use async_trait::async_trait;
use feedwatch_domain::{FollowSource, Item, SourceError};
use std::collections::HashMap;

/// Stub follow source for testing
pub struct StubFollowSource {
    lists: HashMap<String, Vec<String>>,
}

impl StubFollowSource {
    /// Create a stub that knows no subjects
    pub fn empty() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }

    /// Add a subject and the accounts it follows
    pub fn with_list<I, S>(mut self, subject: &str, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists.insert(
            subject.to_string(),
            accounts.into_iter().map(Into::into).collect(),
        );
        self
    }
}

#[async_trait]
impl FollowSource for StubFollowSource {
    async fn fetch_follow_list(&self, subject: &str) -> Result<Vec<Item>, SourceError> {
        self.lists
            .get(subject)
            .map(|accounts| accounts.iter().map(Item::account).collect())
            .ok_or_else(|| SourceError::NotFound(subject.to_string()))
    }
}
