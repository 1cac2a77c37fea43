//! Telegram delivery adapters

mod send;

pub use send::TelegramChannel;

use async_trait::async_trait;
use feedwatch_domain::{DeliveryChannel, DeliveryError, DeliveryTarget, OutboundMessage};

/// Stub delivery channel for testing
pub struct StubChannel {
    enabled: bool,
    sent: std::sync::Mutex<Vec<(DeliveryTarget, OutboundMessage)>>,
}

impl StubChannel {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sent: std::sync::Mutex::new(vec![]),
        }
    }

    /// Get all messages that were sent
    pub fn get_sent(&self) -> Vec<(DeliveryTarget, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for StubChannel {
    async fn send_message(
        &self,
        target: &DeliveryTarget,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        if !self.enabled {
            return Err(DeliveryError::Rejected("Channel disabled".to_string()));
        }

        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), message.clone()));

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
