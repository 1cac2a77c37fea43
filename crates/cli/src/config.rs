//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub news: NewsConfig,

    #[serde(default)]
    pub follow: FollowConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_outbox_path")]
    pub outbox_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    #[serde(default = "default_send_cap")]
    pub send_cap: usize,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub feeds: Vec<String>,

    #[serde(default = "default_items_per_feed")]
    pub items_per_feed: usize,

    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowConfig {
    /// Follow-list API base URL; empty disables follow watches
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_follow_token_env")]
    pub token_env: String,

    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_hf_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_hf_base_url")]
    pub base_url: String,

    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_classifier_retries")]
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_token_env")]
    pub token_env: String,

    #[serde(default = "default_telegram_base_url")]
    pub base_url: String,

    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./feedwatch.sqlite")
}

fn default_outbox_path() -> PathBuf {
    PathBuf::from("./outbox.jsonl")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent() -> usize {
    1
}

fn default_call_timeout() -> u64 {
    30
}

fn default_history_cap() -> usize {
    50
}

fn default_send_cap() -> usize {
    3
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_items_per_feed() -> usize {
    10
}

fn default_follow_token_env() -> String {
    "FOLLOW_API_TOKEN".to_string()
}

fn default_max_pages() -> usize {
    50
}

fn default_provider() -> String {
    "huggingface".to_string()
}

fn default_model() -> String {
    "savasy/bert-base-turkish-sentiment-cased".to_string()
}

fn default_hf_api_key_env() -> String {
    "HUGGINGFACE_API_KEY".to_string()
}

fn default_hf_base_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_classifier_retries() -> u32 {
    1
}

fn default_telegram_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_poll_interval() -> u64 {
    900
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            outbox_path: default_outbox_path(),
            log_level: default_log_level(),
            dry_run: false,
            max_concurrent: default_max_concurrent(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            send_cap: default_send_cap(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feeds: vec![],
            items_per_feed: default_items_per_feed(),
            timeout_secs: default_call_timeout(),
        }
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: default_follow_token_env(),
            timeout_secs: default_call_timeout(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_hf_api_key_env(),
            base_url: default_hf_base_url(),
            timeout_secs: default_call_timeout(),
            retries: default_classifier_retries(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: default_telegram_token_env(),
            base_url: default_telegram_base_url(),
            timeout_secs: default_call_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("FEEDWATCH")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("news.feeds")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# feedwatch configuration

[general]
state_db_path = "./feedwatch.sqlite"
# Messages go here instead of Telegram when dry_run is set
outbox_path = "./outbox.jsonl"
log_level = "info"
dry_run = false
# Subscribers processed at the same time (1 = sequential)
max_concurrent = 1
call_timeout_secs = 30

[engine]
# Identifiers remembered per subscriber
history_cap = 50
# Alerts sent per subscriber per run
send_cap = 3
# Tone is only shown when the classifier score is above this
confidence_threshold = 0.6

[news]
feeds = [
    "https://www.bloomberght.com/rss",
    "https://tr.investing.com/rss/news.rss",
    "https://www.donanimhaber.com/rss/tum/",
]
items_per_feed = 10
timeout_secs = 30

[follow]
# Leave empty to disable follow-list watches
base_url = ""
token_env = "FOLLOW_API_TOKEN"
timeout_secs = 30
max_pages = 50

[classifier]
provider = "huggingface"  # huggingface, stub, none
model = "savasy/bert-base-turkish-sentiment-cased"
api_key_env = "HUGGINGFACE_API_KEY"
base_url = "https://api-inference.huggingface.co"
timeout_secs = 30
retries = 1

[telegram]
token_env = "TELEGRAM_BOT_TOKEN"
base_url = "https://api.telegram.org"
timeout_secs = 30

[server]
bind = "127.0.0.1:8080"
# Used by `run` without --once
poll_interval_secs = 900
"#
        .to_string()
    }
}
