//! Domain models and value objects

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use time::OffsetDateTime;

use crate::dedup::DedupHistory;

/// A comparable entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque identifier used for equality and dedup
    pub id: String,
    /// What gets shown to the subscriber
    pub payload: ItemPayload,
}

/// Display payload of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    /// A news feed entry
    Article {
        title: String,
        link: String,
        source: String,
    },
    /// An account in a follow list
    Account { username: String },
}

impl Item {
    /// Create a news item. The link is the identifier; entries without a
    /// link are identified by the SHA-256 of their title.
    pub fn article(
        title: impl Into<String>,
        link: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        let id = if link.trim().is_empty() {
            let mut hasher = Sha256::new();
            hasher.update(title.as_bytes());
            format!("{:x}", hasher.finalize())
        } else {
            link.trim().to_string()
        };

        Self {
            id,
            payload: ItemPayload::Article {
                title,
                link,
                source: source.into(),
            },
        }
    }

    /// Create a follow-list item identified by its username
    pub fn account(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: username.clone(),
            payload: ItemPayload::Account { username },
        }
    }

    /// Text used for keyword matching and classification
    pub fn display_text(&self) -> &str {
        match &self.payload {
            ItemPayload::Article { title, .. } => title,
            ItemPayload::Account { username } => username,
        }
    }
}

/// Opaque subscriber identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel address a subscriber receives messages on (e.g. a chat id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryTarget(pub String);

impl DeliveryTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a subscriber is watching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchConfig {
    /// News items whose title contains any of these keywords
    Keywords(Vec<String>),
    /// The follow list of a single external account
    Follow { subject: String },
}

impl WatchConfig {
    /// Build a keyword watch, dropping blank entries
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Keywords(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        )
    }

    pub fn follow(subject: impl Into<String>) -> Self {
        Self::Follow {
            subject: subject.into().trim().trim_start_matches('@').to_string(),
        }
    }

    /// Whether there is anything to watch at all
    pub fn is_usable(&self) -> bool {
        match self {
            Self::Keywords(keywords) => keywords.iter().any(|k| !k.trim().is_empty()),
            Self::Follow { subject } => !subject.trim().is_empty(),
        }
    }
}

/// Persisted per-subscriber engine state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriberState {
    /// Identifiers already notified (keyword watches)
    #[serde(default)]
    pub notified: DedupHistory,
    /// Last successfully observed snapshot (follow watches)
    #[serde(default)]
    pub prior_snapshot: Vec<Item>,
    /// When the state was last persisted
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// A registered subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    /// Where notifications go; unset until onboarding binds one
    pub delivery_target: Option<DeliveryTarget>,
    /// What to watch; unset until the subscriber configures it
    pub watch: Option<WatchConfig>,
    #[serde(default)]
    pub state: SubscriberState,
}

impl Subscriber {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: SubscriberId::new(id),
            delivery_target: None,
            watch: None,
            state: SubscriberState::default(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.delivery_target = Some(DeliveryTarget::new(target));
        self
    }

    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.watch = Some(watch);
        self
    }

    pub fn with_state(mut self, state: SubscriberState) -> Self {
        self.state = state;
        self
    }

    /// Replace the watch. State recorded for a different watch is cleared,
    /// so a new follow subject starts from an initialization notice.
    pub fn replace_watch(&mut self, watch: WatchConfig) {
        if self.watch.as_ref() != Some(&watch) {
            self.state = SubscriberState::default();
        }
        self.watch = Some(watch);
    }
}

/// Replacement values for a subscriber's persisted state.
///
/// Fields left as `None` are not touched. A patch is applied as a whole or
/// not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub notified: Option<DedupHistory>,
    pub prior_snapshot: Option<Vec<Item>>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl StatePatch {
    pub fn notified(history: DedupHistory, updated_at: OffsetDateTime) -> Self {
        Self {
            notified: Some(history),
            prior_snapshot: None,
            updated_at,
        }
    }

    pub fn prior_snapshot(snapshot: Vec<Item>, updated_at: OffsetDateTime) -> Self {
        Self {
            notified: None,
            prior_snapshot: Some(snapshot),
            updated_at,
        }
    }

    /// Apply the patch to an in-memory state
    pub fn apply_to(&self, state: &mut SubscriberState) {
        if let Some(notified) = &self.notified {
            state.notified = notified.clone();
        }
        if let Some(snapshot) = &self.prior_snapshot {
            state.prior_snapshot = snapshot.clone();
        }
        state.updated_at = Some(self.updated_at);
    }
}

/// Sentiment label reported by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl SentimentLabel {
    /// Map a raw provider label onto the fixed label set.
    ///
    /// Unknown labels map to neutral.
    pub fn from_raw(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.starts_with("pos") {
            Self::Positive
        } else if label.starts_with("neg") {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// Classifier output for a single item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: SentimentLabel,
    /// Confidence in [0, 1]
    pub score: f64,
}

impl Classification {
    pub const NEUTRAL_SCORE: f64 = 0.5;

    pub fn new(label: SentimentLabel, score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            Self::NEUTRAL_SCORE
        };
        Self { label, score }
    }

    /// Result used whenever classification is unavailable
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: Self::NEUTRAL_SCORE,
        }
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Formatting hint passed to the delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    Markdown,
    #[default]
    Plain,
}

/// A formatted message ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    pub format: MessageFormat,
    /// Identifiers this message accounts for once delivered
    #[serde(default)]
    pub item_ids: Vec<String>,
}

impl OutboundMessage {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: MessageFormat::Markdown,
            item_ids: vec![],
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: MessageFormat::Plain,
            item_ids: vec![],
        }
    }

    pub fn for_item(mut self, id: impl Into<String>) -> Self {
        self.item_ids.push(id.into());
        self
    }
}

/// Overall status of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every eligible subscriber was processed
    Completed,
    /// The global news fetch yielded nothing; no subscriber work was done
    NoData,
}

/// Pipeline stage a subscriber failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Persist,
}

/// Per-subscriber result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubscriberOutcome {
    /// Changes were detected and messages dispatched
    Notified {
        new_items: usize,
        removed_items: usize,
        initialized: bool,
        sent: usize,
        failed: usize,
        persisted: bool,
    },
    /// Nothing changed since the last run
    Unchanged,
    /// Missing configuration; nothing was fetched
    Skipped { reason: String },
    /// Processing stopped for this subscriber
    Failed { stage: FailureStage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberReport {
    pub subscriber_id: SubscriberId,
    #[serde(flatten)]
    pub outcome: SubscriberOutcome,
}

/// Aggregated result of a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run reached every eligible subscriber; per-subscriber failures
    /// are reported in `subscribers`
    pub success: bool,
    pub status: RunStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub subscribers: Vec<SubscriberReport>,
}

impl RunReport {
    /// Total messages delivered across subscribers
    pub fn total_sent(&self) -> usize {
        self.subscribers
            .iter()
            .map(|r| match r.outcome {
                SubscriberOutcome::Notified { sent, .. } => sent,
                _ => 0,
            })
            .sum()
    }

    /// Number of subscribers whose processing failed
    pub fn failures(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|r| matches!(r.outcome, SubscriberOutcome::Failed { .. }))
            .count()
    }

    pub fn outcome_for(&self, id: &str) -> Option<&SubscriberOutcome> {
        self.subscribers
            .iter()
            .find(|r| r.subscriber_id.as_str() == id)
            .map(|r| &r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_id_is_link() {
        let item = Item::article("Bitcoin hits high", "https://news.example/btc", "Wire");
        assert_eq!(item.id, "https://news.example/btc");
        assert_eq!(item.display_text(), "Bitcoin hits high");
    }

    #[test]
    fn test_article_without_link_hashes_title() {
        let a = Item::article("Same title", "", "Wire");
        let b = Item::article("Same title", "  ", "Other");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_keywords_drop_blank_entries() {
        let watch = WatchConfig::keywords(["  bitcoin ", "", "   "]);
        assert_eq!(watch, WatchConfig::Keywords(vec!["bitcoin".to_string()]));
        assert!(watch.is_usable());
        assert!(!WatchConfig::keywords([""]).is_usable());
    }

    #[test]
    fn test_follow_strips_at_sign() {
        assert_eq!(
            WatchConfig::follow("@someone"),
            WatchConfig::Follow {
                subject: "someone".to_string()
            }
        );
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(SentimentLabel::from_raw("positive"), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_raw("NEGATIVE"), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_raw("LABEL_1"), SentimentLabel::Neutral);
    }

    #[test]
    fn test_classification_clamps_score() {
        assert_eq!(Classification::new(SentimentLabel::Positive, 1.7).score, 1.0);
        assert_eq!(Classification::new(SentimentLabel::Positive, f64::NAN).score, 0.5);
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let mut state = SubscriberState {
            notified: DedupHistory::from_ids(["a"]),
            prior_snapshot: vec![Item::account("x")],
            updated_at: None,
        };
        let now = OffsetDateTime::now_utc();

        StatePatch::notified(DedupHistory::from_ids(["a", "b"]), now).apply_to(&mut state);

        assert_eq!(state.notified.len(), 2);
        assert_eq!(state.prior_snapshot, vec![Item::account("x")]);
        assert_eq!(state.updated_at, Some(now));
    }

    #[test]
    fn test_replace_watch_clears_state_of_other_subject() {
        let state = SubscriberState {
            notified: DedupHistory::from_ids(["n"]),
            prior_snapshot: vec![Item::account("a"), Item::account("b")],
            updated_at: Some(OffsetDateTime::UNIX_EPOCH),
        };
        let mut subscriber = Subscriber::new("u1")
            .with_watch(WatchConfig::follow("alice"))
            .with_state(state.clone());

        subscriber.replace_watch(WatchConfig::follow("@alice"));
        assert_eq!(subscriber.state, state);

        subscriber.replace_watch(WatchConfig::follow("bob"));
        assert_eq!(subscriber.watch, Some(WatchConfig::follow("bob")));
        assert_eq!(subscriber.state, SubscriberState::default());
    }

    #[test]
    fn test_report_serializes_success_flag() {
        let report = RunReport {
            success: true,
            status: RunStatus::NoData,
            started_at: OffsetDateTime::UNIX_EPOCH,
            finished_at: OffsetDateTime::UNIX_EPOCH,
            subscribers: vec![],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], "no_data");
    }
}
