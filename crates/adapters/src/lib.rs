//! feedwatch adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `feeds`: RSS/Atom news source
//! - `follow_api`: HTTP follow-list source
//! - `classifier`: Hugging Face inference and stub classifiers
//! - `telegram`: Telegram Bot API delivery channel
//! - `outbox`: JSONL outbox channel for dry runs
//! - `state`: SQLite and in-memory subscriber stores

mod state_memory;
mod state_sqlite;

pub mod classifier;
pub mod feeds;
pub mod follow_api;
pub mod outbox;
pub mod telegram;

/// Re-exports for subscriber store adapters
pub mod state {
    pub use crate::state_memory::InMemorySubscriberStore;
    pub use crate::state_sqlite::SqliteSubscriberStore;
}

/// Re-exports for delivery adapters
pub mod delivery {
    pub use crate::outbox::{OutboxChannel, OutboxWriter};
    pub use crate::telegram::{StubChannel, TelegramChannel};
}
