//! Run command - fetch sources, detect changes, and notify subscribers

use anyhow::{Context, Result};
use feedwatch_adapters::{
    delivery::{OutboxChannel, OutboxWriter, TelegramChannel},
    feeds::{FeedConfig, RssNewsSource},
    follow_api::HttpFollowSource,
    state::SqliteSubscriberStore,
};
use feedwatch_domain::{
    Classifier, DeliveryChannel, FollowSource, NewsSource, RunReport, SystemClock,
    usecases::{BatchConfig, RenderConfig, RunConfig, RunCoordinator},
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::args::RunArgs;
use crate::commands::classify::{build_classifier, classify_config_from_config, load_api_key};
use crate::config::AppConfig;

/// Coordinator wired with the configured adapters
pub(crate) type Coordinator = RunCoordinator<
    dyn NewsSource,
    dyn FollowSource,
    dyn Classifier,
    dyn DeliveryChannel,
    SqliteSubscriberStore,
    SystemClock,
>;

/// Everything a run needs, plus the pieces the webhook reuses
pub(crate) struct Engine {
    pub coordinator: Coordinator,
    pub store: Arc<SqliteSubscriberStore>,
    pub channel: Arc<dyn DeliveryChannel>,
}

/// Where messages go
pub(crate) enum Delivery {
    Telegram,
    Outbox(PathBuf),
}

impl Delivery {
    pub fn from_flags(config: &AppConfig, dry_run: bool, outbox: Option<PathBuf>) -> Self {
        let dry_run = dry_run || config.general.dry_run;
        if outbox.is_some() && !dry_run {
            tracing::warn!("--outbox is ignored without --dry-run");
        }

        if dry_run {
            Self::Outbox(outbox.unwrap_or_else(|| config.general.outbox_path.clone()))
        } else {
            Self::Telegram
        }
    }
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let delivery = Delivery::from_flags(&config, args.dry_run, args.outbox);

    tracing::info!(
        once = args.once,
        dry_run = matches!(delivery, Delivery::Outbox(_)),
        feeds = config.news.feeds.len(),
        "Starting feedwatch run"
    );

    let engine = build_engine(&config, delivery).await?;

    if args.once {
        let report = engine.coordinator.run_once().await.context("Run failed")?;
        print_report(&report)?;
    } else {
        let poll_interval = Duration::from_secs(config.server.poll_interval_secs.max(1));
        let mut ticker = interval(poll_interval);

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        };

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.coordinator.run_once().await {
                        Ok(report) => {
                            tracing::info!(
                                status = ?report.status,
                                sent = report.total_sent(),
                                failures = report.failures(),
                                "Run cycle complete"
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Run cycle failed");
                        }
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down gracefully");
                    break;
                }
            }
        }
    }

    tracing::info!("feedwatch run completed");
    Ok(())
}

fn print_report(report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    println!("{}", json);
    Ok(())
}

pub(crate) async fn build_engine(config: &AppConfig, delivery: Delivery) -> Result<Engine> {
    let store = Arc::new(
        SqliteSubscriberStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite subscriber store")?,
    );

    let news_source: Arc<dyn NewsSource> = Arc::new(build_news_source(config));
    let follow_source: Arc<dyn FollowSource> = Arc::new(build_follow_source(config));
    let classifier = build_classifier(config)?;
    let channel = build_channel(config, delivery).await?;

    let coordinator = RunCoordinator::new(
        news_source,
        follow_source,
        classifier,
        channel.clone(),
        store.clone(),
        Arc::new(SystemClock),
        run_config_from_config(config),
    );

    Ok(Engine {
        coordinator,
        store,
        channel,
    })
}

fn build_news_source(config: &AppConfig) -> RssNewsSource {
    if config.news.feeds.is_empty() {
        tracing::warn!("No news feeds configured; every run will end with no data");
    }

    RssNewsSource::new(FeedConfig {
        feeds: config.news.feeds.clone(),
        items_per_feed: config.news.items_per_feed,
        timeout_secs: config.news.timeout_secs,
    })
}

fn build_follow_source(config: &AppConfig) -> HttpFollowSource {
    let base_url = config.follow.base_url.trim();
    if base_url.is_empty() {
        tracing::debug!("Follow API not configured; follow watches will fail to fetch");
        return HttpFollowSource::disabled();
    }

    HttpFollowSource::new(
        base_url.to_string(),
        optional_secret(&config.follow.token_env),
        config.follow.timeout_secs,
    )
    .with_max_pages(config.follow.max_pages)
}

async fn build_channel(config: &AppConfig, delivery: Delivery) -> Result<Arc<dyn DeliveryChannel>> {
    match delivery {
        Delivery::Outbox(path) => {
            let writer = OutboxWriter::new(path.clone())
                .await
                .context("Failed to initialize outbox writer")?;
            tracing::info!(outbox = %path.display(), "Writing messages to outbox");
            Ok(Arc::new(OutboxChannel::new(writer)))
        }
        Delivery::Telegram => {
            let token = load_api_key(&config.telegram.token_env, "telegram")?;
            Ok(Arc::new(TelegramChannel::with_base_url(
                token,
                config.telegram.base_url.clone(),
                config.telegram.timeout_secs,
            )))
        }
    }
}

pub(crate) fn run_config_from_config(config: &AppConfig) -> RunConfig {
    let call_timeout = Duration::from_secs(config.general.call_timeout_secs);

    RunConfig {
        history_cap: config.engine.history_cap,
        max_concurrent: config.general.max_concurrent,
        call_timeout,
        classify_config: classify_config_from_config(config),
        batch_config: BatchConfig {
            send_cap: config.engine.send_cap,
            timeout: call_timeout,
        },
        render_config: RenderConfig::default(),
    }
}

/// Read a secret that may legitimately be absent
fn optional_secret(env_var: &str) -> Option<SecretString> {
    if env_var.trim().is_empty() {
        return None;
    }

    std::env::var(env_var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| SecretString::new(value.into()))
}
