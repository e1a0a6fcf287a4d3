//! # threadsync CLI
//!
//! The `threadsync` binary runs the ingestion service and a few one-shot
//! maintenance commands.
//!
//! ## Usage
//!
//! ```bash
//! threadsync --config ./config/threadsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `threadsync serve` | Stream comments, upsert threads, serve `/health` and `/status` |
//! | `threadsync init` | Create the vector collection if it is missing |
//! | `threadsync ingest <comment-id>` | Run the pipeline once for one comment |
//! | `threadsync id <native-id>` | Print the point id derived from a comment id |
//!
//! Secrets are read from the environment (a `.env` file is loaded first
//! when present): `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `QDRANT_URL`,
//! `QDRANT_API_KEY`, `OPENAI_API_KEY`. Log verbosity follows `RUST_LOG`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use threadsync::{config, ids, service, store::CollectionStatus};

/// threadsync keeps a vector index of whole subreddit comment threads.
#[derive(Parser)]
#[command(
    name = "threadsync",
    about = "Streams subreddit comments, rebuilds whole reply threads, and upserts them into a vector index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/threadsync.toml` when that file exists;
    /// otherwise built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion service.
    ///
    /// Provisions the collection, authenticates with Reddit, starts the
    /// comment listener, and serves the HTTP endpoints. Runs until killed.
    Serve,

    /// Create the vector collection. Safe to run repeatedly.
    Init,

    /// Process a single comment through the whole pipeline.
    Ingest {
        /// Native comment id (with or without the `t1_` prefix).
        comment_id: String,

        /// Print the chunk instead of embedding and upserting it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the point id derived from a native comment id.
    Id {
        /// Native comment id, e.g. `abc123`.
        native_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Id { native_id } = &cli.command {
        println!("{}", ids::derive_point_id(native_id));
        return Ok(());
    }

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            service::run(&cfg).await?;
        }
        Commands::Init => match service::provision(&cfg).await? {
            CollectionStatus::Created => {
                println!("Collection '{}' created.", cfg.store.collection)
            }
            CollectionStatus::AlreadyExists => {
                println!("Collection '{}' already exists.", cfg.store.collection)
            }
        },
        Commands::Ingest {
            comment_id,
            dry_run,
        } => {
            let chunk = service::ingest_comment(&cfg, &comment_id, dry_run).await?;
            let out = serde_json::json!({
                "id": chunk.id,
                "page_content": chunk.text,
                "metadata": chunk.metadata,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Id { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
