//! # Park Knowledge daemon (`parkd`)
//!
//! ## Usage
//!
//! ```bash
//! parkd --config ./config/parkd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `parkd serve` | Start the HTTP API (ask, ask/stream, ingest, health) |
//! | `parkd ingest <dir>` | Ingest `*.txt` park files from a local directory |

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use park_knowledge::embedding;
use park_knowledge::pipeline::{self, IngestError};
use park_knowledge::qdrant::{QdrantIndex, VectorIndex};
use park_knowledge::{config, http};

/// Park Knowledge — retrieval-grounded question answering over national
/// park documents.
#[derive(Parser)]
#[command(
    name = "parkd",
    about = "Park Knowledge — retrieval-grounded question answering over national park documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/parkd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and the in-process tool bridge.
    Serve,

    /// Ingest park `*.txt` files from a local directory.
    ///
    /// Runs the same pipeline as `POST /ingest`: parse, embed, and upsert
    /// into the configured Qdrant collection.
    Ingest {
        /// Directory containing park text files.
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => http::run_server(&config).await,
        Commands::Ingest { dir } => run_ingest(&config, &dir).await,
    }
}

async fn run_ingest(config: &config::Config, dir: &Path) -> anyhow::Result<()> {
    let documents = pipeline::read_park_dir(dir)?;
    println!("Found {} park files in {}", documents.len(), dir.display());

    let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(&config.qdrant)?);
    let embedder = embedding::create_generator(&config.embedding)?;

    match pipeline::ingest_documents(&embedder, &index, &documents).await {
        Ok(summary) => {
            println!("{}", summary.message);
            Ok(())
        }
        Err(IngestError::Validation(message)) => anyhow::bail!(message),
        Err(IngestError::Upstream(error)) => Err(error),
    }
}
