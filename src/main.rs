//! # panda CLI
//!
//! The `panda` binary runs the chat, CSV and GitHub-issue pipelines.
//!
//! ## Usage
//!
//! ```bash
//! panda --config ./config/panda.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `panda chat` | Interactive chatbot; `exit` prints a summary table |
//! | `panda models` | List models on the Ollama server |
//! | `panda csv` | Index the CSV file into Pinecone Local, then query interactively |
//! | `panda csv-query "<text>"` | One query against Pinecone Local |
//! | `panda issues pull` | Download GitHub issues to a JSON file |
//! | `panda issues index` | Embed the issues into the on-disk store |
//! | `panda issues ask "<query>"` | Print metadata of the most similar issues |
//!
//! Settings not in the config file come from defaults, then from `.env` and
//! the environment (`OLLAMA_HOST`, `OLLAMA_MODEL`, `GITHUB_TOKEN`, ...).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use panda_rag::{ask, chat, config, github, issues, ollama, telemetry, vdb};

/// panda: local RAG pipelines over Ollama.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/panda.example.toml` for every option.
#[derive(Parser)]
#[command(
    name = "panda",
    about = "Local RAG pipelines over Ollama, Pinecone Local and SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/panda.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/panda.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the configured Ollama model.
    ///
    /// The whole transcript is sent on every turn. Type `exit` to print a
    /// summary of the conversation.
    Chat,

    /// List models available on the Ollama server.
    Models,

    /// Index the CSV file into Pinecone Local, then answer queries.
    Csv {
        /// Skip indexing and go straight to the query prompt.
        #[arg(long)]
        skip_index: bool,
    },

    /// Run a single similarity query against Pinecone Local.
    CsvQuery {
        /// Query text.
        text: String,
    },

    /// GitHub issue pipeline.
    Issues {
        #[command(subcommand)]
        action: IssuesAction,
    },
}

#[derive(Subcommand)]
enum IssuesAction {
    /// Download issues from the GitHub API into `issues.file`.
    Pull,

    /// Build the on-disk vector store from `issues.file`.
    ///
    /// Does nothing if `issues.persist_dir` already exists.
    Index,

    /// Query the on-disk vector store.
    Ask {
        /// Query text. Defaults to `issues.query`.
        query: Option<String>,

        /// Number of issues to return. Defaults to `issues.k`.
        #[arg(long)]
        k: Option<usize>,

        /// Only return issues scoring at least this cosine similarity.
        #[arg(long)]
        score_threshold: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env: {}", e);
        }
    }
    telemetry::init_tracing();

    let cfg = config::load_config(&cli.config)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Models => {
            ollama::run_models(&cfg.ollama).await?;
        }
        Commands::Csv { skip_index } => {
            vdb::run_csv(&cfg, skip_index).await?;
        }
        Commands::CsvQuery { text } => {
            vdb::run_csv_query(&cfg, &text).await?;
        }
        Commands::Issues { action } => match action {
            IssuesAction::Pull => {
                github::run_pull(&cfg.github, &cfg.issues.file).await?;
            }
            IssuesAction::Index => {
                issues::run_index(&cfg).await?;
            }
            IssuesAction::Ask {
                query,
                k,
                score_threshold,
            } => {
                ask::run_ask(&cfg, query.as_deref(), k, score_threshold).await?;
            }
        },
    }

    Ok(())
}
