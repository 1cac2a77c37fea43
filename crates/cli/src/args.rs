//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// feedwatch: keyword news alerts and follow-list change notifications
#[derive(Parser, Debug)]
#[command(name = "feedwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check sources and notify subscribers
    Run(RunArgs),

    /// Serve the cron trigger and the Telegram webhook over HTTP
    Serve(ServeArgs),

    /// Manage subscribers
    Subscribers(SubscribersArgs),

    /// One-shot sentiment classification of text
    Classify(ClassifyArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Write messages to the outbox file instead of Telegram
    #[arg(long)]
    pub dry_run: bool,

    /// Execute one run and exit
    #[arg(long)]
    pub once: bool,

    /// Path to outbox file (used with --dry-run)
    #[arg(long)]
    pub outbox: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    pub bind: Option<String>,

    /// Write messages to the outbox file instead of Telegram
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct SubscribersArgs {
    #[command(subcommand)]
    pub command: SubscribersCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubscribersCommands {
    /// Create a subscriber or replace its watch
    Add {
        /// Subscriber identifier
        id: String,

        /// Keyword to match in news titles (repeatable)
        #[arg(long = "keyword", required_unless_present = "follow")]
        keywords: Vec<String>,

        /// Account whose follow list is watched
        #[arg(long, conflicts_with = "keywords")]
        follow: Option<String>,
    },

    /// Bind a subscriber to a Telegram chat
    Link {
        /// Subscriber identifier
        id: String,

        /// Telegram chat id
        target: String,
    },

    /// List stored subscribers
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Text to classify
    #[arg(long)]
    pub text: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
