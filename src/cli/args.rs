//! Command line argument parsing for the Satchel CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Satchel - an embedded, offline-first full-text index
#[derive(Parser, Debug, Clone)]
#[command(name = "satchel")]
#[command(about = "Build and query on-device full-text indexes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct SatchelArgs {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Index configuration file (JSON)
    #[arg(long, value_name = "FILE", env = "SATCHEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl SatchelArgs {
    /// Effective verbosity: 0 quiet, 1 normal, 2 verbose, 3 debug.
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose.saturating_add(1).min(3)
        }
    }

    /// Default log filter for the effective verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity() {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add documents from a JSON Lines file, committing in batches
    Index(IndexArgs),

    /// Search an index
    Search(SearchArgs),

    /// Print a stored document by id
    Get(GetArgs),

    /// Show index statistics
    Stats(IndexPathArgs),

    /// Verify every segment of an index
    Check(IndexPathArgs),

    /// Merge all segments into one, dropping deleted documents
    Merge(IndexPathArgs),
}

/// Arguments for bulk indexing
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,

    /// Documents, one JSON object per line
    #[arg(value_name = "JSONL")]
    pub document_file: PathBuf,

    /// Documents per commit
    #[arg(short, long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,

    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Offset for pagination
    #[arg(short, long, default_value = "0")]
    pub offset: usize,
}

/// Arguments for document lookup
#[derive(Parser, Debug, Clone)]
pub struct GetArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,

    /// Document id
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments of commands that only need an index
#[derive(Parser, Debug, Clone)]
pub struct IndexPathArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX")]
    pub index_path: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
