//! End-to-end behaviour of the run coordinator over several runs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedwatch_domain::usecases::{BatchConfig, RunConfig, RunCoordinator};
use feedwatch_domain::{
    Classification, ClassifyError, Classifier, Clock, DedupHistory, DeliveryChannel,
    DeliveryError, DeliveryTarget, FailureStage, FollowSource, Item, MessageFormat, NewsSource,
    OutboundMessage, RunStatus, SentimentLabel, SourceError, StatePatch, StoreError, Subscriber,
    SubscriberId, SubscriberOutcome, SubscriberState, SubscriberStore, WatchConfig,
};
use time::OffsetDateTime;

#[derive(Default)]
struct ScriptedNews {
    items: Mutex<Vec<Item>>,
}

impl ScriptedNews {
    fn set(&self, items: Vec<Item>) {
        *self.items.lock().unwrap() = items;
    }
}

#[async_trait]
impl NewsSource for ScriptedNews {
    async fn fetch_news_snapshot(&self) -> Result<Vec<Item>, SourceError> {
        Ok(self.items.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct ScriptedFollows {
    lists: Mutex<HashMap<String, Vec<&'static str>>>,
    stalled: Mutex<HashSet<String>>,
}

impl ScriptedFollows {
    fn set(&self, subject: &str, names: Vec<&'static str>) {
        self.lists
            .lock()
            .unwrap()
            .insert(subject.to_string(), names);
    }

    fn stall(&self, subject: &str) {
        self.stalled.lock().unwrap().insert(subject.to_string());
    }
}

#[async_trait]
impl FollowSource for ScriptedFollows {
    async fn fetch_follow_list(&self, subject: &str) -> Result<Vec<Item>, SourceError> {
        let stalled = self.stalled.lock().unwrap().contains(subject);
        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        match self.lists.lock().unwrap().get(subject) {
            Some(names) => Ok(names.iter().map(|n| Item::account(*n)).collect()),
            None => Err(SourceError::Api(format!("lookup of {} failed", subject))),
        }
    }
}

struct NeutralClassifier;

#[async_trait]
impl Classifier for NeutralClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, ClassifyError> {
        Ok(Classification::new(SentimentLabel::Neutral, 0.7))
    }
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(DeliveryTarget, OutboundMessage)>>,
    rejected: Mutex<Vec<&'static str>>,
    stalled: Mutex<HashSet<String>>,
}

impl RecordingChannel {
    /// Reject messages whose text contains `needle`
    fn reject(&self, needle: &'static str) {
        self.rejected.lock().unwrap().push(needle);
    }

    fn accept_all(&self) {
        self.rejected.lock().unwrap().clear();
    }

    fn stall(&self, target: &str) {
        self.stalled.lock().unwrap().insert(target.to_string());
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn texts_for(&self, target: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t.as_str() == target)
            .map(|(_, m)| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send_message(
        &self,
        target: &DeliveryTarget,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        let stalled = self.stalled.lock().unwrap().contains(target.as_str());
        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let rejected = self
            .rejected
            .lock()
            .unwrap()
            .iter()
            .any(|needle| message.text.contains(needle));
        if rejected {
            return Err(DeliveryError::Api("message rejected".to_string()));
        }

        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), message.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[derive(Default)]
struct MemoryStore {
    subscribers: Mutex<Vec<Subscriber>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    fn with(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers: Mutex::new(subscribers),
            writes: Mutex::new(0),
        }
    }

    fn state(&self, id: &str) -> SubscriberState {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id.as_str() == id)
            .map(|s| s.state.clone())
            .unwrap()
    }

    fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self.subscribers.lock().unwrap().clone())
    }

    async fn update_subscriber_state(
        &self,
        id: &SubscriberId,
        patch: &StatePatch,
    ) -> Result<(), StoreError> {
        let mut subscribers = self.subscribers.lock().unwrap();
        let subscriber = subscribers
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(&mut subscriber.state);
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn set_watch(&self, id: &SubscriberId, watch: &WatchConfig) -> Result<(), StoreError> {
        let mut subscribers = self.subscribers.lock().unwrap();
        let subscriber = subscribers
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        subscriber.replace_watch(watch.clone());
        Ok(())
    }

    async fn bind_delivery_target(
        &self,
        _id: &SubscriberId,
        _target: &DeliveryTarget,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }
}

struct Harness {
    news: Arc<ScriptedNews>,
    follows: Arc<ScriptedFollows>,
    channel: Arc<RecordingChannel>,
    store: Arc<MemoryStore>,
    coordinator: RunCoordinator<
        ScriptedNews,
        ScriptedFollows,
        NeutralClassifier,
        RecordingChannel,
        MemoryStore,
        FixedClock,
    >,
}

fn harness(subscribers: Vec<Subscriber>, config: RunConfig) -> Harness {
    let news = Arc::new(ScriptedNews::default());
    let follows = Arc::new(ScriptedFollows::default());
    let channel = Arc::new(RecordingChannel::default());
    let store = Arc::new(MemoryStore::with(subscribers));

    let coordinator = RunCoordinator::new(
        news.clone(),
        follows.clone(),
        Some(Arc::new(NeutralClassifier)),
        channel.clone(),
        store.clone(),
        Arc::new(FixedClock),
        config,
    );

    Harness {
        news,
        follows,
        channel,
        store,
        coordinator,
    }
}

fn headline(n: usize) -> Item {
    Item::article(
        format!("Bitcoin update {}", n),
        format!("https://n.example/{}", n),
        "Wire",
    )
}

fn reader(id: &str) -> Subscriber {
    Subscriber::new(id)
        .with_target(format!("chat-{}", id))
        .with_watch(WatchConfig::keywords(["bitcoin"]))
}

fn follower(id: &str, subject: &str) -> Subscriber {
    Subscriber::new(id)
        .with_target(format!("chat-{}", id))
        .with_watch(WatchConfig::follow(subject))
}

#[tokio::test]
async fn keyword_scenario_sends_single_matching_item() {
    let h = harness(vec![reader("u1")], RunConfig::default());
    h.news.set(vec![
        Item::article("Bitcoin hits high", "https://n.example/btc", "Wire"),
        Item::article("Stock market flat", "https://n.example/stocks", "Wire"),
    ]);

    h.coordinator.run_once().await.unwrap();

    let texts = h.channel.texts_for("chat-u1");
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Bitcoin hits high"));
    assert_eq!(
        h.store.state("u1").notified,
        DedupHistory::from_ids(["https://n.example/btc"])
    );
}

#[tokio::test]
async fn follow_scenario_sends_one_message_per_category() {
    let h = harness(vec![follower("u1", "subject")], RunConfig::default());
    h.news.set(vec![headline(0)]);
    h.follows.set("subject", vec!["a", "b", "c"]);
    h.coordinator.run_once().await.unwrap();

    h.follows.set("subject", vec!["a", "c", "d"]);
    let report = h.coordinator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome_for("u1"),
        Some(SubscriberOutcome::Notified {
            new_items: 1,
            removed_items: 1,
            sent: 2,
            ..
        })
    ));

    let texts = h.channel.texts_for("chat-u1");
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[1], "@subject started following: d");
    assert_eq!(texts[2], "@subject unfollowed: b");

    let snapshot: Vec<_> = h
        .store
        .state("u1")
        .prior_snapshot
        .iter()
        .map(|i| i.id.clone())
        .collect();
    assert_eq!(snapshot, vec!["a", "c", "d"]);
}

#[tokio::test]
async fn second_run_without_new_data_is_idempotent() {
    let h = harness(
        vec![reader("u1"), follower("u2", "subject")],
        RunConfig::default(),
    );
    h.news.set(vec![headline(1), headline(2)]);
    h.follows.set("subject", vec!["a", "b"]);

    h.coordinator.run_once().await.unwrap();
    let sent = h.channel.count();
    let writes = h.store.writes();
    let states = (h.store.state("u1"), h.store.state("u2"));

    let report = h.coordinator.run_once().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(h.channel.count(), sent);
    assert_eq!(h.store.writes(), writes);
    assert_eq!((h.store.state("u1"), h.store.state("u2")), states);
    assert!(
        report
            .subscribers
            .iter()
            .all(|r| r.outcome == SubscriberOutcome::Unchanged)
    );
}

#[tokio::test]
async fn history_never_exceeds_cap() {
    let config = RunConfig {
        history_cap: 5,
        ..Default::default()
    };
    let h = harness(vec![reader("u1")], config);

    for run in 0..6 {
        h.news
            .set((run * 3..run * 3 + 3).map(headline).collect());
        h.coordinator.run_once().await.unwrap();
        assert!(h.store.state("u1").notified.len() <= 5);
    }

    let history: Vec<_> = h.store.state("u1").notified.iter().map(String::from).collect();
    assert_eq!(
        history,
        (13..18)
            .map(|n| format!("https://n.example/{}", n))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn delivered_items_are_never_resent() {
    let h = harness(vec![reader("u1")], RunConfig::default());
    h.news.set(vec![headline(1)]);
    h.coordinator.run_once().await.unwrap();

    h.news.set(vec![headline(1), headline(2)]);
    h.coordinator.run_once().await.unwrap();

    let texts = h.channel.texts_for("chat-u1");
    assert_eq!(texts.len(), 2);
    assert_eq!(
        texts.iter().filter(|t| t.contains("Bitcoin update 1")).count(),
        1
    );
}

#[tokio::test]
async fn send_cap_defers_remaining_items_to_next_run() {
    let h = harness(vec![reader("u1")], RunConfig::default());
    h.news.set((0..5).map(headline).collect());

    h.coordinator.run_once().await.unwrap();

    assert_eq!(h.channel.count(), 3);
    assert_eq!(h.store.state("u1").notified.len(), 3);

    h.coordinator.run_once().await.unwrap();

    assert_eq!(h.channel.count(), 5);
    let texts = h.channel.texts_for("chat-u1");
    assert!(texts[3].contains("Bitcoin update 3"));
    assert!(texts[4].contains("Bitcoin update 4"));
}

#[tokio::test]
async fn first_observation_sends_single_initialization_notice() {
    let h = harness(vec![follower("u1", "@subject")], RunConfig::default());
    h.news.set(vec![headline(0)]);
    h.follows.set("subject", vec!["a", "b", "c"]);

    let report = h.coordinator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome_for("u1"),
        Some(SubscriberOutcome::Notified {
            initialized: true,
            new_items: 0,
            removed_items: 0,
            sent: 1,
            ..
        })
    ));
    let texts = h.channel.texts_for("chat-u1");
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Now tracking @subject (3 accounts)"));
    assert_eq!(h.store.state("u1").prior_snapshot.len(), 3);
}

#[tokio::test]
async fn failing_subscriber_does_not_block_others() {
    let h = harness(
        vec![follower("a", "unknown"), reader("b")],
        RunConfig {
            max_concurrent: 2,
            ..Default::default()
        },
    );
    h.news.set(vec![headline(7)]);

    let report = h.coordinator.run_once().await.unwrap();

    assert_eq!(report.failures(), 1);
    assert_eq!(h.channel.texts_for("chat-b").len(), 1);
    assert_eq!(h.store.state("b").notified.len(), 1);
    assert_eq!(report.subscribers[0].subscriber_id.as_str(), "a");
    assert_eq!(report.subscribers[1].subscriber_id.as_str(), "b");
}

#[tokio::test]
async fn alerts_are_sent_as_markdown() {
    let h = harness(vec![reader("u1")], RunConfig::default());
    h.news.set(vec![headline(1)]);

    h.coordinator.run_once().await.unwrap();

    let sent = h.channel.sent.lock().unwrap();
    assert_eq!(sent[0].1.format, MessageFormat::Markdown);
    assert!(sent[0].1.text.contains("Neutral"));
}

#[tokio::test]
async fn new_follow_subject_starts_with_initialization_notice() {
    let h = harness(vec![follower("u1", "alice")], RunConfig::default());
    h.news.set(vec![headline(0)]);
    h.follows.set("alice", vec!["a", "b", "c"]);
    h.follows.set("bob", vec!["x", "y"]);
    h.coordinator.run_once().await.unwrap();

    h.store
        .set_watch(&SubscriberId::new("u1"), &WatchConfig::follow("bob"))
        .await
        .unwrap();
    let report = h.coordinator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome_for("u1"),
        Some(SubscriberOutcome::Notified {
            initialized: true,
            new_items: 0,
            removed_items: 0,
            sent: 1,
            ..
        })
    ));
    let texts = h.channel.texts_for("chat-u1");
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Now tracking @bob (2 accounts)"));
    assert!(texts.iter().all(|t| !t.contains("unfollowed")));

    let snapshot: Vec<_> = h
        .store
        .state("u1")
        .prior_snapshot
        .iter()
        .map(|i| i.id.clone())
        .collect();
    assert_eq!(snapshot, vec!["x", "y"]);
}

#[tokio::test]
async fn rejected_alert_is_retried_next_run() {
    let h = harness(vec![reader("u1")], RunConfig::default());
    h.news.set((0..3).map(headline).collect());
    h.channel.reject("Bitcoin update 1");

    let report = h.coordinator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome_for("u1"),
        Some(SubscriberOutcome::Notified {
            sent: 2,
            failed: 1,
            persisted: true,
            ..
        })
    ));
    let history = h.store.state("u1").notified;
    assert!(history.seen("https://n.example/0"));
    assert!(!history.seen("https://n.example/1"));
    assert!(history.seen("https://n.example/2"));

    h.channel.accept_all();
    let report = h.coordinator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome_for("u1"),
        Some(SubscriberOutcome::Notified {
            new_items: 1,
            sent: 1,
            failed: 0,
            ..
        })
    ));
    let texts = h.channel.texts_for("chat-u1");
    assert_eq!(texts.len(), 3);
    assert!(texts[2].contains("Bitcoin update 1"));
    assert!(h.store.state("u1").notified.seen("https://n.example/1"));
}

#[tokio::test(start_paused = true)]
async fn stalled_calls_time_out_without_blocking_others() {
    let config = RunConfig {
        call_timeout: Duration::from_secs(5),
        batch_config: BatchConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    };
    let h = harness(
        vec![follower("a", "slow"), reader("b"), reader("c")],
        config,
    );
    h.news.set(vec![headline(1)]);
    h.follows.set("slow", vec!["x"]);
    h.follows.stall("slow");
    h.channel.stall("chat-b");

    let report = h.coordinator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome_for("a"),
        Some(SubscriberOutcome::Failed {
            stage: FailureStage::Fetch,
            ..
        })
    ));
    assert!(matches!(
        report.outcome_for("b"),
        Some(SubscriberOutcome::Notified {
            sent: 0,
            failed: 1,
            persisted: false,
            ..
        })
    ));
    assert!(matches!(
        report.outcome_for("c"),
        Some(SubscriberOutcome::Notified {
            sent: 1,
            persisted: true,
            ..
        })
    ));

    assert!(h.store.state("a").prior_snapshot.is_empty());
    assert!(h.store.state("b").notified.is_empty());
    assert_eq!(h.channel.texts_for("chat-c").len(), 1);
}
