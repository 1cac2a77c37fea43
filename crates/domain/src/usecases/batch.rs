//! Notification batcher - builds messages for a delta and drives delivery

use std::time::Duration;

use crate::{
    model::{DeliveryTarget, Item, OutboundMessage},
    ports::{DeliveryChannel, DeliveryError},
    usecases::{classify::Assessment, render::Renderer},
};

/// Configuration for the batcher
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum per-item messages delivered to one subscriber per run
    pub send_cap: usize,
    /// Upper bound for a single delivery call
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            send_cap: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Whether the send cap applies to a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPolicy {
    /// Per-item alerts, truncated to the send cap in processing order
    Capped,
    /// Summary messages, always sent in full
    Uncapped,
}

/// What happened while sending a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Messages the channel accepted
    pub sent: usize,
    /// Messages the channel rejected or timed out on
    pub failed: usize,
    /// Item identifiers carried by accepted messages, in send order
    pub delivered_ids: Vec<String>,
}

/// Builds and sends notification batches for a single channel
pub struct NotificationBatcher<'a, D: ?Sized> {
    channel: &'a D,
    renderer: &'a Renderer,
    config: BatchConfig,
}

impl<'a, D: DeliveryChannel + ?Sized> NotificationBatcher<'a, D> {
    pub fn new(channel: &'a D, renderer: &'a Renderer, config: BatchConfig) -> Self {
        Self {
            channel,
            renderer,
            config,
        }
    }

    /// The leading items that fit in one run's send cap
    pub fn take_capped<'i>(&self, items: &'i [Item]) -> &'i [Item] {
        &items[..items.len().min(self.config.send_cap)]
    }

    /// One Markdown alert per item, paired positionally with assessments
    pub fn build_article_messages(
        &self,
        items: &[Item],
        assessments: &[Assessment],
    ) -> Vec<OutboundMessage> {
        items
            .iter()
            .zip(assessments)
            .map(|(item, assessment)| self.renderer.render_article(item, assessment))
            .collect()
    }

    /// Category summaries for follow-list changes
    pub fn build_follow_messages(
        &self,
        subject: &str,
        new_items: &[Item],
        removed_items: &[Item],
    ) -> Vec<OutboundMessage> {
        self.renderer
            .render_follow_changes(subject, new_items, removed_items)
    }

    /// Send messages in order. A failed message does not stop the ones
    /// after it; only accepted messages contribute delivered identifiers.
    pub async fn send(
        &self,
        target: &DeliveryTarget,
        messages: &[OutboundMessage],
        policy: SendPolicy,
    ) -> BatchOutcome {
        let limit = match policy {
            SendPolicy::Capped => self.config.send_cap,
            SendPolicy::Uncapped => messages.len(),
        };

        let mut outcome = BatchOutcome::default();

        for message in messages.iter().take(limit) {
            let result = match tokio::time::timeout(
                self.config.timeout,
                self.channel.send_message(target, message),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout),
            };

            match result {
                Ok(()) => {
                    outcome.sent += 1;
                    outcome
                        .delivered_ids
                        .extend(message.item_ids.iter().cloned());
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        channel = self.channel.name(),
                        delivery_target = %target,
                        error = %e,
                        "Failed to deliver message"
                    );
                }
            }
        }

        if messages.len() > limit {
            tracing::debug!(
                delivery_target = %target,
                capped = messages.len() - limit,
                "Send cap reached, deferring remaining messages"
            );
        }

        outcome
    }
}
