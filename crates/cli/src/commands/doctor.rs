//! Doctor command - validate configuration and show status

use anyhow::Result;
use feedwatch_adapters::state::SqliteSubscriberStore;
use feedwatch_domain::SubscriberStore;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    store: CheckResult,
    news: CheckResult,
    follow: CheckResult,
    classifier: CheckResult,
    telegram: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        store: CheckResult::error("Not checked"),
        news: CheckResult::error("Not checked"),
        follow: CheckResult::error("Not checked"),
        classifier: CheckResult::error("Not checked"),
        telegram: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.store = check_store(config).await;
        report.news = check_news(config);
        report.follow = check_follow(config);
        report.classifier = check_classifier(config);
        report.telegram = check_env_secret("Bot token", &config.telegram.token_env);
    }

    let checks = [
        &report.config,
        &report.store,
        &report.news,
        &report.follow,
        &report.classifier,
        &report.telegram,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_store(config: &AppConfig) -> CheckResult {
    let path = &config.general.state_db_path;

    let store = match SqliteSubscriberStore::new(path).await {
        Ok(store) => store,
        Err(e) => return CheckResult::error(format!("Cannot open {}: {}", path.display(), e)),
    };

    if let Err(e) = store.ping().await {
        return CheckResult::error(format!("Store not reachable: {}", e));
    }

    match store.list_subscribers().await {
        Ok(subscribers) => {
            let linked = subscribers
                .iter()
                .filter(|s| s.delivery_target.is_some())
                .count();
            CheckResult::ok(format!(
                "{} ({} subscribers, {} linked)",
                path.display(),
                subscribers.len(),
                linked
            ))
            .with_details(serde_json::json!({
                "path": path,
                "subscribers": subscribers.len(),
                "linked": linked,
            }))
        }
        Err(e) => CheckResult::error(format!("Failed to read subscribers: {}", e)),
    }
}

fn check_news(config: &AppConfig) -> CheckResult {
    let feeds = &config.news.feeds;
    if feeds.is_empty() {
        return CheckResult::warn("No feeds configured; runs end with no data");
    }

    CheckResult::ok(format!("{} feeds", feeds.len())).with_details(serde_json::json!({
        "feeds": feeds,
        "items_per_feed": config.news.items_per_feed,
    }))
}

fn check_follow(config: &AppConfig) -> CheckResult {
    let base_url = config.follow.base_url.trim();
    if base_url.is_empty() {
        return CheckResult::ok("Follow API disabled");
    }

    let env_var = &config.follow.token_env;
    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => {
            CheckResult::ok(format!("{} with token {} (set)", base_url, env_var))
        }
        _ => CheckResult::warn(format!("{} with token {} (not set)", base_url, env_var)),
    }
}

fn check_classifier(config: &AppConfig) -> CheckResult {
    let provider = &config.classifier.provider;
    let model = &config.classifier.model;

    match provider.as_str() {
        "none" => CheckResult::ok("Classifier disabled; alerts render neutral"),
        "stub" => CheckResult::ok("Provider: stub (offline)"),
        "huggingface" => {
            let env_var = &config.classifier.api_key_env;
            if env_var.is_empty() {
                return CheckResult::error("No API key env var configured for huggingface");
            }

            // build_classifier refuses to start without the key
            match std::env::var(env_var) {
                Ok(val) if !val.is_empty() => CheckResult::ok(format!(
                    "Provider: huggingface, Model: {}, API key: {} (set)",
                    model, env_var
                )),
                _ => CheckResult::error(format!(
                    "Provider: huggingface, Model: {}, API key: {} (not set)",
                    model, env_var
                )),
            }
        }
        other => CheckResult::error(format!("Unknown provider: {}", other)),
    }
}

fn check_env_secret(label: &str, env_var: &str) -> CheckResult {
    if env_var.is_empty() {
        return CheckResult::error(format!("No {} env var configured", label.to_lowercase()));
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!("{}: {} (set)", label, env_var)),
        _ => CheckResult::warn(format!(
            "{}: {} (not set, only --dry-run will work)",
            label, env_var
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("feedwatch Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Store", &report.store);
    print_check("News", &report.news);
    print_check("Follow API", &report.follow);
    print_check("Classifier", &report.classifier);
    print_check("Telegram", &report.telegram);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: feedwatch run --dry-run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
