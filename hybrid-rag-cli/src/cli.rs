//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "hybrid-rag",
    version,
    about = "Hybrid dense + BM25 retrieval over Qdrant",
    long_about = None
)]
pub struct Cli {
    /// YAML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "HYBRID_RAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk, embed, and write a CSV of articles into both collections.
    Ingest {
        /// Path to a CSV with `title`, `author`, `link`, `text` columns.
        #[arg(long)]
        csv: PathBuf,
    },
    /// Retrieve the best context chunks for a question.
    Query {
        /// The question text.
        text: String,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as YAML.
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}
