//! Rendering use case - turns detected changes into subscriber-facing messages

use crate::model::{Item, ItemPayload, OutboundMessage};
use crate::usecases::classify::{Assessment, Tone};

/// Configuration for the renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Titles longer than this are cut at a word boundary
    pub max_title_chars: usize,
    /// Whether to show the feed name under the title
    pub include_source: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_title_chars: 300,
            include_source: true,
        }
    }
}

/// Renderer for notification messages
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a news item alert (Markdown)
    pub fn render_article(&self, item: &Item, assessment: &Assessment) -> OutboundMessage {
        let (marker, tone_name) = match assessment.tone {
            Tone::Positive => ("🚀", "POSITIVE"),
            Tone::Negative => ("🔻", "NEGATIVE"),
            Tone::Neutral => ("😐", "Neutral"),
        };
        let percent = (assessment.classification.score * 100.0).round() as u32;

        let (title, link, source) = match &item.payload {
            ItemPayload::Article {
                title,
                link,
                source,
            } => (title.as_str(), link.as_str(), source.as_str()),
            ItemPayload::Account { username } => (username.as_str(), "", ""),
        };

        let mut text = format!(
            "{} *{}* update ({}%)\n\n📰 *{}*",
            marker,
            tone_name,
            percent,
            escape_markdown(&truncate_words(title, self.config.max_title_chars))
        );

        if self.config.include_source && !source.is_empty() {
            text.push_str(&format!("\n_{}_", escape_markdown(source)));
        }

        if !link.is_empty() {
            text.push_str(&format!("\n\n🔗 [Read the article]({})", link));
        }

        OutboundMessage::markdown(text).for_item(item.id.clone())
    }

    /// Render follow-list changes: one message per non-empty category
    pub fn render_follow_changes(
        &self,
        subject: &str,
        new_items: &[Item],
        removed_items: &[Item],
    ) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();

        if !new_items.is_empty() {
            messages.push(OutboundMessage::plain(format!(
                "@{} started following: {}",
                subject,
                join_names(new_items)
            )));
        }

        if !removed_items.is_empty() {
            messages.push(OutboundMessage::plain(format!(
                "@{} unfollowed: {}",
                subject,
                join_names(removed_items)
            )));
        }

        messages
    }

    /// Render the notice sent when a subject is observed for the first time
    pub fn render_initialized(&self, subject: &str, snapshot: &[Item]) -> OutboundMessage {
        OutboundMessage::plain(format!(
            "Now tracking @{} ({} accounts). You will be notified when this list changes.",
            subject,
            snapshot.len()
        ))
    }
}

fn join_names(items: &[Item]) -> String {
    items
        .iter()
        .map(Item::display_text)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape characters with meaning in Markdown message formatting
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | ']' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Cut to at most `max_chars` characters, preferring a word boundary
fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed)
}
