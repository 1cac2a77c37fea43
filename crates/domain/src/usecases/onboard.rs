//! Onboarding use case - binds a chat to a subscriber from a `/start <id>`
//! message received by the bot

use crate::{
    model::{DeliveryTarget, OutboundMessage, SubscriberId},
    ports::{DeliveryChannel, StoreError, SubscriberStore},
};

/// Reply sent after a chat was bound
pub const LINKED_REPLY: &str =
    "✅ Your account is linked. Notifications will be delivered to this chat.";

/// Reply sent for a bare `/start`
pub const GREETING_REPLY: &str =
    "Hi! Use the \"Connect Telegram\" button in the app to link this chat to your account.";

/// A bot command understood during onboarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartCommand {
    /// `/start <subscriber id>`
    Link(SubscriberId),
    /// `/start` without an argument
    Greeting,
}

/// Parse a `/start` command. Other text yields `None`.
pub fn parse_start_command(text: &str) -> Option<StartCommand> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;

    // Group chats address the bot as /start@botname
    if command != "/start" && !command.starts_with("/start@") {
        return None;
    }

    match parts.next() {
        Some(id) => Some(StartCommand::Link(SubscriberId::new(id))),
        None => Some(StartCommand::Greeting),
    }
}

/// What handling a message resulted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardOutcome {
    Linked(SubscriberId),
    Greeted,
    Ignored,
}

pub struct OnboardUseCase<'a, St: ?Sized, D: ?Sized> {
    store: &'a St,
    channel: &'a D,
}

impl<'a, St, D> OnboardUseCase<'a, St, D>
where
    St: SubscriberStore + ?Sized,
    D: DeliveryChannel + ?Sized,
{
    pub fn new(store: &'a St, channel: &'a D) -> Self {
        Self { store, channel }
    }

    /// Handle an incoming chat message. Only store failures are errors; a
    /// failed reply is logged.
    pub async fn handle(
        &self,
        chat: &DeliveryTarget,
        text: &str,
    ) -> Result<OnboardOutcome, StoreError> {
        let Some(command) = parse_start_command(text) else {
            return Ok(OnboardOutcome::Ignored);
        };

        let (outcome, reply) = match command {
            StartCommand::Link(id) => {
                self.store.bind_delivery_target(&id, chat).await?;
                tracing::info!(subscriber_id = %id, delivery_target = %chat, "Linked chat");
                (OnboardOutcome::Linked(id), LINKED_REPLY)
            }
            StartCommand::Greeting => (OnboardOutcome::Greeted, GREETING_REPLY),
        };

        if let Err(e) = self
            .channel
            .send_message(chat, &OutboundMessage::plain(reply))
            .await
        {
            tracing::warn!(delivery_target = %chat, error = %e, "Failed to send onboarding reply");
        }

        Ok(outcome)
    }
}
