//! Port definitions (traits) for external collaborators
//!
//! These traits define the boundaries between the engine and the outside
//! world. Adapters implement them to connect to feeds, classifiers, messaging
//! channels and subscriber storage.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    Classification, DeliveryTarget, Item, OutboundMessage, StatePatch, Subscriber, SubscriberId,
    WatchConfig,
};

/// Error type for snapshot source operations
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Subject not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Source not configured")]
    Disabled,
}

/// Port for the aggregated news snapshot shared by every keyword subscriber
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch the current items across all configured feeds.
    ///
    /// Individual failing feeds are skipped; an error means no feed could be
    /// reached at all.
    async fn fetch_news_snapshot(&self) -> Result<Vec<Item>, SourceError>;
}

/// Port for fetching the follow list of a tracked account
#[async_trait]
pub trait FollowSource: Send + Sync {
    async fn fetch_follow_list(&self, subject: &str) -> Result<Vec<Item>, SourceError>;
}

/// Error type for classifier operations
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classifier API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Port for sentiment classification
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError>;
}

/// Error type for delivery operations
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Target rejected the message: {0}")]
    Rejected(String),
    #[error("Timeout")]
    Timeout,
}

/// Port for the messaging channel notifications go out on
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send a single formatted message to a subscriber's target
    async fn send_message(
        &self,
        target: &DeliveryTarget,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError>;

    /// Channel name (e.g., "telegram", "outbox")
    fn name(&self) -> &'static str;
}

/// Error type for subscriber store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the subscriber document store keyed by subscriber id
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// List every registered subscriber with its persisted state
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;

    /// Apply a state patch to one subscriber atomically
    async fn update_subscriber_state(
        &self,
        id: &SubscriberId,
        patch: &StatePatch,
    ) -> Result<(), StoreError>;

    /// Set what a subscriber watches, creating the subscriber if needed.
    /// Changing the watch clears the subscriber's notified history and
    /// prior snapshot.
    async fn set_watch(&self, id: &SubscriberId, watch: &WatchConfig) -> Result<(), StoreError>;

    /// Bind a delivery target to a subscriber, creating the subscriber if needed
    async fn bind_delivery_target(
        &self,
        id: &SubscriberId,
        target: &DeliveryTarget,
    ) -> Result<(), StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
