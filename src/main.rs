//! # Tax Law Context CLI (`taxctx`)
//!
//! Ingest a tax-law PDF and query it from the command line.
//!
//! ## Usage
//!
//! ```bash
//! taxctx --config ./config/taxctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `taxctx init` | Create the SQLite cache schema |
//! | `taxctx ingest <source>` | Ingest a PDF path or URL |
//! | `taxctx search "<query>" --source <src>` | Ranked chunks for a query |
//! | `taxctx context "<query>" --source <src>` | Prompt-ready context string |
//! | `taxctx outline --source <src>` | Heading tree with page ranges |
//!
//! Without a cache configured every command ingests the source afresh.
//! Logs go to stderr and honor `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use taxlaw_context::{commands, config};

/// Tax Law Context CLI: ingestion and retrieval of tax-law PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/taxctx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "taxctx",
    about = "Ingest tax-law PDFs and retrieve prompt-ready context from them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/taxctx.toml`. When the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/taxctx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the cache database schema.
    ///
    /// Idempotent. Requires `[cache] path` in the config file.
    Init,

    /// Ingest a PDF from a local path or an http(s) URL.
    Ingest {
        source: String,

        /// Ignore any cached ingestion and run the pipeline again.
        #[arg(long)]
        force: bool,
    },

    /// Search a document and print ranked chunks.
    Search {
        query: String,

        /// PDF path or URL to search.
        #[arg(long)]
        source: String,

        /// Maximum number of results (defaults to `[retrieval] limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Drop results whose normalized score is below this.
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Print the context string assembled for a query.
    Context {
        query: String,

        #[arg(long)]
        source: String,

        /// Token budget (defaults to `[retrieval] max_context_tokens`).
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Print the detected heading outline of a document.
    Outline {
        #[arg(long)]
        source: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        config::Config::minimal()
    };

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Ingest { source, force } => {
            commands::run_ingest(&cfg, &source, force).await?;
        }
        Commands::Search {
            query,
            source,
            limit,
            min_score,
        } => {
            commands::run_search(&cfg, &query, &source, limit, min_score).await?;
        }
        Commands::Context {
            query,
            source,
            max_tokens,
        } => {
            commands::run_context(&cfg, &query, &source, max_tokens).await?;
        }
        Commands::Outline { source } => {
            commands::run_outline(&cfg, &source).await?;
        }
    }

    Ok(())
}
