//! Outbox channel for dry runs: messages are appended to a JSONL file
//! instead of being delivered.

use async_trait::async_trait;
use feedwatch_domain::{
    DeliveryChannel, DeliveryError, DeliveryTarget, MessageFormat, OutboundMessage,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct OutboxWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(path: PathBuf) -> Result<Self, OutboxError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &OutboxEntry<'_>) -> Result<(), OutboxError> {
        let line = serde_json::to_string(entry)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

/// Delivery channel that records every message in the outbox
#[derive(Debug, Clone)]
pub struct OutboxChannel {
    writer: OutboxWriter,
}

impl OutboxChannel {
    pub fn new(writer: OutboxWriter) -> Self {
        Self { writer }
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    written_at: OffsetDateTime,
    delivery_target: &'a str,
    format: MessageFormat,
    text: &'a str,
    item_ids: &'a [String],
}

#[async_trait]
impl DeliveryChannel for OutboxChannel {
    async fn send_message(
        &self,
        target: &DeliveryTarget,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        let entry = OutboxEntry {
            id: Uuid::new_v4(),
            written_at: OffsetDateTime::now_utc(),
            delivery_target: target.as_str(),
            format: message.format,
            text: &message.text,
            item_ids: &message.item_ids,
        };

        self.writer
            .append(&entry)
            .await
            .map_err(|error| DeliveryError::Api(format!("Outbox write failed: {}", error)))?;

        tracing::debug!(
            delivery_target = %target,
            outbox = %self.writer.path().display(),
            "Message written to outbox"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "outbox"
    }
}
