//! Run coordinator - fetches snapshots for every subscriber, computes deltas,
//! dispatches notifications and persists state

use std::borrow::Cow;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::{
    dedup::DEFAULT_HISTORY_CAP,
    delta::{self, Delta},
    model::{
        DeliveryTarget, FailureStage, Item, RunReport, RunStatus, StatePatch, Subscriber,
        SubscriberOutcome, SubscriberReport, SubscriberState, WatchConfig,
    },
    ports::{
        Classifier, Clock, DeliveryChannel, FollowSource, NewsSource, SourceError, StoreError,
        SubscriberStore,
    },
    usecases::{
        batch::{BatchConfig, NotificationBatcher, SendPolicy},
        classify::{ClassifyConfig, ClassifyUseCase},
        render::{RenderConfig, Renderer},
    },
};

/// Configuration for the run coordinator
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum identifiers kept in a subscriber's dedup history
    pub history_cap: usize,
    /// Maximum subscribers processed at the same time
    pub max_concurrent: usize,
    /// Upper bound for snapshot fetches and store calls
    pub call_timeout: Duration,
    /// Classification config
    pub classify_config: ClassifyConfig,
    /// Batching config
    pub batch_config: BatchConfig,
    /// Render config
    pub render_config: RenderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            max_concurrent: 1,
            call_timeout: Duration::from_secs(30),
            classify_config: ClassifyConfig::default(),
            batch_config: BatchConfig::default(),
            render_config: RenderConfig::default(),
        }
    }
}

/// Run coordinator
pub struct RunCoordinator<N, F, C, D, St, Cl>
where
    N: NewsSource + ?Sized,
    F: FollowSource + ?Sized,
    C: Classifier + ?Sized,
    D: DeliveryChannel + ?Sized,
    St: SubscriberStore + ?Sized,
    Cl: Clock + ?Sized,
{
    news_source: Arc<N>,
    follow_source: Arc<F>,
    classifier: Option<Arc<C>>,
    channel: Arc<D>,
    store: Arc<St>,
    clock: Arc<Cl>,
    config: RunConfig,
    renderer: Renderer,
}

/// Messages sent for one subscriber and the state change they justify
struct Dispatch {
    sent: usize,
    failed: usize,
    initialized: bool,
    patch: Option<StatePatch>,
}

impl<N, F, C, D, St, Cl> RunCoordinator<N, F, C, D, St, Cl>
where
    N: NewsSource + ?Sized,
    F: FollowSource + ?Sized,
    C: Classifier + ?Sized,
    D: DeliveryChannel + ?Sized,
    St: SubscriberStore + ?Sized,
    Cl: Clock + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        news_source: Arc<N>,
        follow_source: Arc<F>,
        classifier: Option<Arc<C>>,
        channel: Arc<D>,
        store: Arc<St>,
        clock: Arc<Cl>,
        config: RunConfig,
    ) -> Self {
        let renderer = Renderer::new(config.render_config.clone());
        Self {
            news_source,
            follow_source,
            classifier,
            channel,
            store,
            clock,
            config,
            renderer,
        }
    }

    /// Execute one full run across all subscribers
    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        let started_at = self.clock.now();

        let news = with_timeout(
            self.config.call_timeout,
            self.news_source.fetch_news_snapshot(),
            || SourceError::Network("Timed out fetching news".to_string()),
        )
        .await
        .map_err(|e| RunError::Source(e.to_string()))?;

        if news.is_empty() {
            tracing::info!("No news fetched, ending run");
            return Ok(RunReport {
                success: true,
                status: RunStatus::NoData,
                started_at,
                finished_at: self.clock.now(),
                subscribers: vec![],
            });
        }

        tracing::info!(count = news.len(), "Fetched news snapshot");

        let subscribers = with_timeout(
            self.config.call_timeout,
            self.store.list_subscribers(),
            || StoreError::Database("Timed out listing subscribers".to_string()),
        )
        .await
        .map_err(|e| RunError::Store(e.to_string()))?;

        let subscribers = unique_by_id(subscribers);
        tracing::info!(count = subscribers.len(), "Processing subscribers");

        let max_concurrent = self.config.max_concurrent.max(1);
        let news = news.as_slice();
        let reports: Vec<SubscriberReport> = stream::iter(subscribers)
            .map(|subscriber| self.process_subscriber(subscriber, news))
            .buffered(max_concurrent)
            .collect()
            .await;

        let report = RunReport {
            success: true,
            status: RunStatus::Completed,
            started_at,
            finished_at: self.clock.now(),
            subscribers: reports,
        };

        tracing::info!(
            subscribers = report.subscribers.len(),
            sent = report.total_sent(),
            failures = report.failures(),
            "Run complete"
        );

        Ok(report)
    }

    /// Process one subscriber; every failure ends up in the returned report
    async fn process_subscriber(&self, subscriber: Subscriber, news: &[Item]) -> SubscriberReport {
        let subscriber_id = subscriber.id.clone();
        let outcome = self.process(subscriber, news).await;

        match &outcome {
            SubscriberOutcome::Failed { stage, reason } => {
                tracing::error!(
                    subscriber_id = %subscriber_id,
                    stage = ?stage,
                    error = %reason,
                    "Subscriber processing failed"
                );
            }
            SubscriberOutcome::Skipped { reason } => {
                tracing::debug!(subscriber_id = %subscriber_id, reason = %reason, "Skipped");
            }
            SubscriberOutcome::Unchanged => {
                tracing::debug!(subscriber_id = %subscriber_id, "No changes");
            }
            SubscriberOutcome::Notified { sent, failed, .. } => {
                tracing::info!(
                    subscriber_id = %subscriber_id,
                    sent = sent,
                    failed = failed,
                    "Notified subscriber"
                );
            }
        }

        SubscriberReport {
            subscriber_id,
            outcome,
        }
    }

    async fn process(&self, subscriber: Subscriber, news: &[Item]) -> SubscriberOutcome {
        let Some(target) = subscriber
            .delivery_target
            .clone()
            .filter(|t| !t.as_str().trim().is_empty())
        else {
            return SubscriberOutcome::Skipped {
                reason: "No delivery target".to_string(),
            };
        };

        let Some(watch) = subscriber.watch.clone().filter(WatchConfig::is_usable) else {
            return SubscriberOutcome::Skipped {
                reason: "No watch configuration".to_string(),
            };
        };

        let snapshot = match self.fetch_snapshot(&watch, news).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return SubscriberOutcome::Failed {
                    stage: FailureStage::Fetch,
                    reason: e.to_string(),
                };
            }
        };

        let delta = match delta::strategy_for(&watch).compute(&snapshot, &subscriber.state) {
            Ok(delta) => delta,
            Err(e) => {
                return SubscriberOutcome::Failed {
                    stage: FailureStage::Fetch,
                    reason: e.to_string(),
                };
            }
        };

        if delta.is_empty() {
            return SubscriberOutcome::Unchanged;
        }

        let new_items = delta.new_items().len();
        let removed_items = delta.removed_items().len();

        let dispatch = match &watch {
            WatchConfig::Keywords(_) => {
                self.dispatch_alerts(&target, &subscriber.state, delta.new_items())
                    .await
            }
            WatchConfig::Follow { subject } => {
                self.dispatch_follow_changes(&target, subject, delta, &snapshot)
                    .await
            }
        };

        let persisted = match &dispatch.patch {
            Some(patch) => {
                let result = with_timeout(
                    self.config.call_timeout,
                    self.store.update_subscriber_state(&subscriber.id, patch),
                    || StoreError::Database("Timed out persisting state".to_string()),
                )
                .await;

                if let Err(e) = result {
                    tracing::warn!(
                        subscriber_id = %subscriber.id,
                        sent = dispatch.sent,
                        "Messages were sent but state could not be persisted"
                    );
                    return SubscriberOutcome::Failed {
                        stage: FailureStage::Persist,
                        reason: e.to_string(),
                    };
                }
                true
            }
            None => false,
        };

        SubscriberOutcome::Notified {
            new_items,
            removed_items,
            initialized: dispatch.initialized,
            sent: dispatch.sent,
            failed: dispatch.failed,
            persisted,
        }
    }

    async fn fetch_snapshot<'n>(
        &self,
        watch: &WatchConfig,
        news: &'n [Item],
    ) -> Result<Cow<'n, [Item]>, SourceError> {
        match watch {
            WatchConfig::Keywords(_) => Ok(Cow::Borrowed(news)),
            WatchConfig::Follow { subject } => with_timeout(
                self.config.call_timeout,
                self.follow_source.fetch_follow_list(subject),
                || SourceError::Network(format!("Timed out fetching follow list of {}", subject)),
            )
            .await
            .map(Cow::Owned),
        }
    }

    fn batcher(&self) -> NotificationBatcher<'_, D> {
        NotificationBatcher::new(
            self.channel.as_ref(),
            &self.renderer,
            self.config.batch_config.clone(),
        )
    }

    /// Classify, send and record per-item alerts within the send cap. Only
    /// identifiers of delivered alerts are added to the history.
    async fn dispatch_alerts(
        &self,
        target: &DeliveryTarget,
        state: &SubscriberState,
        new_items: &[Item],
    ) -> Dispatch {
        let batcher = self.batcher();
        let candidates = batcher.take_capped(new_items);

        let classify = ClassifyUseCase::new(
            self.classifier.as_deref(),
            self.config.classify_config.clone(),
        );
        let mut assessments = Vec::with_capacity(candidates.len());
        for item in candidates {
            assessments.push(classify.assess(item.display_text()).await);
        }

        let messages = batcher.build_article_messages(candidates, &assessments);
        let outcome = batcher.send(target, &messages, SendPolicy::Capped).await;

        let patch = if outcome.delivered_ids.is_empty() {
            None
        } else {
            let history = outcome
                .delivered_ids
                .iter()
                .fold(state.notified.clone(), |history, id| {
                    history.append(id.as_str(), self.config.history_cap)
                });
            Some(StatePatch::notified(history, self.clock.now()))
        };

        Dispatch {
            sent: outcome.sent,
            failed: outcome.failed,
            initialized: false,
            patch,
        }
    }

    /// Send follow-list summaries; the new snapshot replaces the prior one
    /// regardless of delivery outcome.
    async fn dispatch_follow_changes(
        &self,
        target: &DeliveryTarget,
        subject: &str,
        delta: Delta,
        snapshot: &[Item],
    ) -> Dispatch {
        let batcher = self.batcher();

        let (messages, current, initialized) = match delta {
            Delta::Initialized { snapshot } => {
                let notice = self.renderer.render_initialized(subject, &snapshot);
                (vec![notice], snapshot, true)
            }
            Delta::Changes {
                new_items,
                removed_items,
            } => (
                batcher.build_follow_messages(subject, &new_items, &removed_items),
                delta::dedup_by_id(snapshot),
                false,
            ),
        };

        let outcome = batcher.send(target, &messages, SendPolicy::Uncapped).await;

        Dispatch {
            sent: outcome.sent,
            failed: outcome.failed,
            initialized,
            patch: Some(StatePatch::prior_snapshot(current, self.clock.now())),
        }
    }
}

/// Errors that abort a whole run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("News source error: {0}")]
    Source(String),
    #[error("Subscriber store error: {0}")]
    Store(String),
}

async fn with_timeout<T, E>(
    duration: Duration,
    fut: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E> {
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

/// Keep the first record per subscriber id so no two tasks share a subscriber
fn unique_by_id(subscribers: Vec<Subscriber>) -> Vec<Subscriber> {
    let mut seen = HashSet::new();
    subscribers
        .into_iter()
        .filter(|s| {
            let fresh = seen.insert(s.id.clone());
            if !fresh {
                tracing::warn!(subscriber_id = %s.id, "Duplicate subscriber record ignored");
            }
            fresh
        })
        .collect()
}
