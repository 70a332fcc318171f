use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use warden::classifier::{coerce_label, FileModelStore, StatisticalClassifier, TextClassifier};
use warden::config::Config;
use warden::db::Database;
use warden::message::{AuthorInfo, IncomingMessage};
use warden::moderation::{DryRunTransport, ModerationMachine};
use warden::output::terminal;
use warden::pipeline::intake::Intake;
use warden::pipeline::training;
use warden::rules::RuleEngine;
use warden::scoring::Detector;

/// Warden: hybrid spam triage for a monitored chat channel.
///
/// Screens messages with deterministic rules and a trainable classifier,
/// queues suspicious ones for moderators, and learns from their decisions.
#[derive(Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the detector on a piece of text and explain the verdict
    Check {
        /// The message text
        text: String,

        /// Author handle (links to it count as self-mentions)
        #[arg(long)]
        username: Option<String>,
    },

    /// Screen messages through the full intake path (dry-run transport)
    Screen {
        /// Text of a single message to screen
        text: Option<String>,

        /// JSON Lines file of messages to screen instead
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Message id for a single message
        #[arg(long, default_value = "1")]
        message_id: i64,

        /// Author id for a single message
        #[arg(long, default_value = "1")]
        user_id: i64,

        /// Author handle for a single message
        #[arg(long)]
        username: Option<String>,

        /// Number of messages to screen in parallel (default: WARDEN_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Apply a moderator action from callback data (e.g. "ban:123:456")
    Moderate {
        /// Callback payload: <skip|ban|trust>:<message_id>:<user_id>
        callback: String,

        /// Id of the acting moderator
        #[arg(long)]
        moderator: i64,
    },

    /// Feed unprocessed moderator decisions to the classifier
    Train,

    /// Train the classifier from scratch on a JSON Lines file of labeled examples
    Bootstrap {
        /// File with one {"text": "...", "label": 0|1} object per line
        path: PathBuf,
    },

    /// Show system status (DB counts, training backlog, model state)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warden=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Warden database...");
            let config = Config::load()?;
            let db = warden::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nWarden is ready. Next step: set up your .env file");
            println!("  (see .env.example for required variables)");
            println!("\nThen train the classifier: warden bootstrap <examples.jsonl>");
        }

        Commands::Check { text, username } => {
            let config = Config::load()?;
            let classifier = load_classifier(&config).await?;
            let detector = build_detector(&config, classifier);
            let author = AuthorInfo {
                id: 0,
                username,
                ..Default::default()
            };
            let verdict = detector.decide(&text, &author).await;
            terminal::display_verdict(&text, &verdict);
        }

        Commands::Screen {
            text,
            file,
            message_id,
            user_id,
            username,
            concurrency,
        } => {
            let config = Config::load()?;
            let channel_id = config.require_channel()?;
            let moderation_chat_id = config.require_moderation_chat()?;
            let db = warden::db::open_sqlite(&config.db_path)?;
            let classifier = load_classifier(&config).await?;
            let detector = Arc::new(build_detector(&config, classifier));
            let intake = Intake::new(
                db,
                detector,
                Arc::new(DryRunTransport::echoing()),
                moderation_chat_id,
            );

            let messages = match (text, file) {
                (_, Some(path)) => read_messages(&path)?,
                (Some(text), None) => vec![IncomingMessage {
                    chat_id: channel_id,
                    message_id,
                    author: AuthorInfo {
                        id: user_id,
                        username,
                        ..Default::default()
                    },
                    text: Some(text),
                    caption: None,
                }],
                (None, None) => anyhow::bail!("Pass a message text or --file <messages.jsonl>"),
            };

            let outcomes = intake
                .screen_batch(&messages, concurrency.unwrap_or(config.concurrency))
                .await;
            for (msg, outcome) in messages.iter().zip(&outcomes) {
                if let Some(verdict) = outcome.verdict() {
                    terminal::display_verdict(msg.content(), verdict);
                } else {
                    println!(
                        "\n{}",
                        format!("=== message {} ===", msg.message_id).bold()
                    );
                }
                terminal::display_screen_outcome(outcome);
            }
        }

        Commands::Moderate {
            callback,
            moderator,
        } => {
            let config = Config::load()?;
            let channel_id = config.require_channel()?;
            let db = warden::db::open_sqlite(&config.db_path)?;
            let machine = ModerationMachine::new(db, Arc::new(DryRunTransport::new()), channel_id);
            let outcome = machine.handle_callback(&callback, moderator).await?;
            terminal::display_moderation_outcome(&outcome);
        }

        Commands::Train => {
            let config = Config::load()?;
            let db = warden::db::open_sqlite(&config.db_path)?;
            let classifier = load_classifier(&config).await?;
            let run = training::run(db.as_ref(), classifier.as_ref()).await?;
            terminal::display_training_run(&run);
        }

        Commands::Bootstrap { path } => {
            let config = Config::load()?;
            let (texts, labels) = read_labeled_examples(&path)?;
            println!("Training on {} examples from {}...", texts.len(), path.display());
            let classifier = load_classifier(&config).await?;
            let report = classifier.train(&texts, &labels).await?;
            terminal::display_training_report(&report);
            println!("Model saved to {}", classifier.store_location());
        }

        Commands::Status => {
            let config = Config::load()?;
            let classifier = load_classifier(&config).await?;
            if Path::new(&config.db_path).exists() {
                let db = warden::db::open_sqlite(&config.db_path)?;
                warden::status::show(&db, &config.db_path, &classifier).await?;
            } else {
                println!("Database: not initialized");
                println!("\nRun `warden init` to set up the database.");
            }
        }
    }

    Ok(())
}

/// Open the classifier, loading the stored model when there is one.
async fn load_classifier(config: &Config) -> Result<Arc<StatisticalClassifier>> {
    let store = Arc::new(FileModelStore::new(config.model_path.clone()));
    let classifier = StatisticalClassifier::open(store)
        .await
        .with_context(|| format!("Failed to load model from {}", config.model_path.display()))?;
    if !classifier.is_trained() {
        info!("Classifier not trained yet; verdicts use rules only");
    }
    Ok(Arc::new(classifier))
}

fn build_detector(config: &Config, classifier: Arc<StatisticalClassifier>) -> Detector {
    let classifier: Arc<dyn TextClassifier> = classifier;
    Detector::new(RuleEngine::new(config.home_channel.clone()), classifier)
}

#[derive(Deserialize)]
struct LabeledLine {
    text: String,
    label: serde_json::Value,
}

/// Read `{"text", "label"}` lines, dropping lines whose label isn't 0 or 1.
fn read_labeled_examples(path: &Path) -> Result<(Vec<String>, Vec<i64>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut texts = Vec::new();
    let mut labels = Vec::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: LabeledLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: not a labeled example", path.display(), n + 1))?;
        match coerce_label(&parsed.label) {
            Some(label) => {
                texts.push(parsed.text);
                labels.push(label);
            }
            None => warn!(line = n + 1, label = %parsed.label, "Skipping example with invalid label"),
        }
    }
    Ok((texts, labels))
}

fn read_messages(path: &Path) -> Result<Vec<IncomingMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: not a message", path.display(), n + 1))
        })
        .collect()
}
