//! # Cerevyn RAG CLI (`cerevyn-rag`)
//!
//! Runs the HTTP service, or performs one-off ingestion and retrieval
//! against the configured store without starting it.
//!
//! ## Usage
//!
//! ```bash
//! cerevyn-rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cerevyn-rag serve` | Start the HTTP service (default) |
//! | `cerevyn-rag add-text "<text>"` | Embed and store a text snippet |
//! | `cerevyn-rag add-file <path>` | Extract, embed, and store a file |
//! | `cerevyn-rag search "<query>"` | Print the closest documents as JSON |
//! | `cerevyn-rag context "<query>"` | Print a context block |
//! | `cerevyn-rag get <id>` | Print one stored document as JSON |
//! | `cerevyn-rag stats` | Print the number of stored documents |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use cerevyn_rag::config;
use cerevyn_rag::logging;
use cerevyn_rag::models::Metadata;
use cerevyn_rag::rag::RagService;
use cerevyn_rag::server;

/// Cerevyn RAG: document ingestion and similarity retrieval for prompt grounding.
#[derive(Parser)]
#[command(name = "cerevyn-rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    Serve,

    /// Embed and store a text snippet.
    AddText {
        text: String,

        /// Metadata as a JSON object of string, number, or boolean values.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Extract text from a file, embed it, and store it.
    AddFile { path: PathBuf },

    /// Print the closest stored documents.
    Search {
        query: String,

        #[arg(long, short = 'n')]
        n: Option<usize>,
    },

    /// Print the text of the closest documents joined into one block.
    Context {
        query: String,

        #[arg(long, short = 'n')]
        n: Option<usize>,
    },

    /// Print one stored document by id.
    Get { id: String },

    /// Print the number of stored documents.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(cfg.debug);

    let rag = Arc::new(RagService::from_config(&cfg).await?);
    let default_n = cfg.retrieval.default_results;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            server::run_server(&cfg, rag).await?;
        }
        Commands::AddText { text, metadata } => {
            let metadata = metadata
                .map(|raw| serde_json::from_str::<Metadata>(&raw))
                .transpose()
                .context("--metadata must be a JSON object")?;
            let id = rag.add_document(&text, metadata).await?;
            println!("{id}");
        }
        Commands::AddFile { path } => {
            if !path.is_file() {
                anyhow::bail!("No such file: {}", path.display());
            }
            let id = rag.add_file(&path).await?;
            println!("{id}");
        }
        Commands::Search { query, n } => {
            let hits = rag.search(&query, n.unwrap_or(default_n)).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Context { query, n } => {
            let context = rag.get_context(&query, n.unwrap_or(default_n)).await?;
            println!("{context}");
        }
        Commands::Get { id } => match rag.get_document(&id).await? {
            Some(doc) => {
                let out = serde_json::json!({
                    "id": doc.id,
                    "text": doc.text,
                    "metadata": doc.metadata,
                    "dims": doc.embedding.len(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            None => anyhow::bail!("No document with id {}", id),
        },
        Commands::Stats => {
            println!("documents: {}", rag.document_count().await?);
        }
    }

    Ok(())
}
