//! # docgate CLI
//!
//! ## Usage
//!
//! ```bash
//! docgate --config ./config/docgate.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docgate chunk <file>` | Print chunk boundaries for a file |
//! | `docgate ask <path> "<question>"` | Answer a question over a file or directory |
//! | `docgate summarize <file>` | Summarize a transcript (`.json`) or text file |
//! | `docgate video-id <url>` | Print the video id from a watch URL |
//! | `docgate serve` | Start the HTTP server |
//! | `docgate completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect how a document will be split
//! docgate chunk notes.md --size 200 --overlap 20
//!
//! # Ask over a docs directory, returning unverified answers
//! docgate ask ./docs "What is the capital of Canada?" --lenient
//!
//! # Serve sessions over HTTP
//! docgate serve --config ./config/docgate.toml
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use docgate::{commands, config, logging, server};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "./config/docgate.toml";

/// docgate: answer questions over your documents, or refuse.
#[derive(Parser)]
#[command(
    name = "docgate",
    about = "Relevance-gated document question answering",
    version,
    long_about = "docgate retrieves context with hybrid BM25 + vector search, checks that \
    the context can answer the question, drafts an answer and verifies it against the \
    context before returning it."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docgate.toml` when it exists, otherwise built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a file into chunks and print their boundaries.
    Chunk {
        file: PathBuf,

        /// Maximum chunk length in characters (default: `[chunking].size`).
        #[arg(long)]
        size: Option<usize>,

        /// Characters shared between neighbouring chunks (default: `[chunking].overlap`).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Answer a question over a file or a directory of documents.
    Ask {
        path: PathBuf,
        question: String,

        /// Chunks to retrieve (default: `[retrieval].k`).
        #[arg(long)]
        k: Option<usize>,

        /// Skip verification and return answers with their confidence.
        #[arg(long)]
        lenient: bool,
    },

    /// Summarize a transcript JSON file or a text file.
    Summarize { file: PathBuf },

    /// Print the video id contained in a watch URL.
    VideoId { url: String },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions { shell: Shell },
}

fn load(path: Option<&Path>) -> Result<config::Config> {
    match path {
        Some(p) => config::load_config(p),
        None if Path::new(DEFAULT_CONFIG).exists() => config::load_config(Path::new(DEFAULT_CONFIG)),
        None => Ok(config::Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::VideoId { url } => return commands::run_video_id(url),
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "docgate", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let cfg = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Chunk {
            file,
            size,
            overlap,
        } => {
            let size = size.unwrap_or(cfg.chunking.size);
            let overlap =
                overlap.unwrap_or_else(|| cfg.chunking.overlap.min(size.saturating_sub(1)));
            commands::run_chunk(&file, size, overlap)?;
        }
        Commands::Ask {
            path,
            question,
            k,
            lenient,
        } => {
            commands::run_ask(&cfg, &path, &question, k, lenient).await?;
        }
        Commands::Summarize { file } => {
            commands::run_summarize(&cfg, &file).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::VideoId { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
