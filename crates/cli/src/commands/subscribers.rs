//! Subscribers command - register watches and bind delivery targets

use anyhow::{Context, Result, bail};
use feedwatch_adapters::state::SqliteSubscriberStore;
use feedwatch_domain::{DeliveryTarget, Subscriber, SubscriberId, SubscriberStore, WatchConfig};
use std::path::PathBuf;

use crate::args::{SubscribersArgs, SubscribersCommands};
use crate::config::AppConfig;

pub async fn execute(args: SubscribersArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = SqliteSubscriberStore::new(&config.general.state_db_path)
        .await
        .context("Failed to open subscriber store")?;

    match args.command {
        SubscribersCommands::Add {
            id,
            keywords,
            follow,
        } => add(&store, &id, keywords, follow).await,
        SubscribersCommands::Link { id, target } => link(&store, &id, &target).await,
        SubscribersCommands::List { json } => list(&store, json).await,
    }
}

async fn add(
    store: &SqliteSubscriberStore,
    id: &str,
    keywords: Vec<String>,
    follow: Option<String>,
) -> Result<()> {
    let id = parse_id(id)?;
    let watch = match follow {
        Some(subject) => WatchConfig::follow(subject),
        None => WatchConfig::keywords(keywords),
    };

    if !watch.is_usable() {
        bail!("Watch for {} has no keywords or subject", id);
    }

    store
        .set_watch(&id, &watch)
        .await
        .context("Failed to save watch")?;

    println!("Saved watch for {}: {}", id, describe_watch(Some(&watch)));
    Ok(())
}

async fn link(store: &SqliteSubscriberStore, id: &str, target: &str) -> Result<()> {
    let id = parse_id(id)?;
    let target = target.trim();
    if target.is_empty() {
        bail!("Delivery target must not be empty");
    }

    store
        .bind_delivery_target(&id, &DeliveryTarget::new(target))
        .await
        .context("Failed to bind delivery target")?;

    println!("Linked {} to chat {}", id, target);
    Ok(())
}

async fn list(store: &SqliteSubscriberStore, json: bool) -> Result<()> {
    let subscribers = store
        .list_subscribers()
        .await
        .context("Failed to list subscribers")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&subscribers)?);
        return Ok(());
    }

    if subscribers.is_empty() {
        println!("No subscribers.");
        return Ok(());
    }

    for subscriber in &subscribers {
        print_subscriber(subscriber);
    }

    Ok(())
}

fn parse_id(id: &str) -> Result<SubscriberId> {
    let id = id.trim();
    if id.is_empty() {
        bail!("Subscriber id must not be empty");
    }
    Ok(SubscriberId::new(id))
}

fn describe_watch(watch: Option<&WatchConfig>) -> String {
    match watch {
        Some(WatchConfig::Keywords(keywords)) => format!("keywords [{}]", keywords.join(", ")),
        Some(WatchConfig::Follow { subject }) => format!("follows of @{}", subject),
        None => "no watch".to_string(),
    }
}

fn print_subscriber(subscriber: &Subscriber) {
    let target = subscriber
        .delivery_target
        .as_ref()
        .map(|t| t.as_str())
        .unwrap_or("(not linked)");

    println!("{}", subscriber.id);
    println!("  target:   {}", target);
    println!("  watch:    {}", describe_watch(subscriber.watch.as_ref()));
    println!(
        "  notified: {}, snapshot: {}",
        subscriber.state.notified.len(),
        subscriber.state.prior_snapshot.len()
    );
}
