//! CLI command definitions and parsing
use crate::chunking::SplitBy;
use crate::citation::CitationFormat;
use crate::retrieval::LengthPreference;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragrank",
    version,
    author = "neur0map",
    about = "Hybrid retrieval and ranking for retrieval-augmented generation",
    long_about = "ragrank splits documents into chunks, scores them against a query with BM25 and \
                  embedding similarity, fuses and reranks the results, and prints numbered context \
                  with attributed citations."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragrank/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a text file into chunks and print them
    Chunk {
        /// File to chunk
        file: PathBuf,

        /// Natural unit to split on
        #[arg(long, value_parser = parse_split_by)]
        split_by: Option<SplitBy>,

        /// Maximum chunk length in characters
        #[arg(long)]
        max_chunk_size: Option<usize>,

        /// Minimum chunk length in characters
        #[arg(long)]
        min_chunk_size: Option<usize>,

        /// Overlap carried between chunks, in characters
        #[arg(long)]
        overlap_size: Option<usize>,

        /// Print chunks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve ranked context and citations for a query
    Query {
        /// Search query text
        query: String,

        /// Agent whose documents are searched
        #[arg(short, long, default_value = "default")]
        agent: String,

        /// Documents root (defaults to store.documents_dir)
        #[arg(long, value_name = "DIR")]
        docs: Option<PathBuf>,

        /// Number of results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Weight of the semantic signal, between 0 and 1
        #[arg(long)]
        semantic_weight: Option<f32>,

        /// Citation style
        #[arg(short, long, value_parser = parse_citation_format)]
        format: Option<CitationFormat>,

        /// Weight of the same-document diversity penalty
        #[arg(long)]
        diversity_weight: Option<f32>,

        /// Weight of the recency signal
        #[arg(long)]
        recency_weight: Option<f32>,

        /// Preferred chunk length
        #[arg(long, value_parser = parse_length)]
        length: Option<LengthPreference>,

        /// Show results in JSON format
        #[arg(long, conflicts_with = "prompt")]
        json: bool,

        /// Print an augmented prompt instead of context and citations
        #[arg(long)]
        prompt: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_split_by(s: &str) -> Result<SplitBy, String> {
    s.parse().map_err(|e: crate::error::RagError| e.to_string())
}

fn parse_citation_format(s: &str) -> Result<CitationFormat, String> {
    s.parse().map_err(|e: crate::error::RagError| e.to_string())
}

fn parse_length(s: &str) -> Result<LengthPreference, String> {
    s.parse().map_err(|e: crate::error::RagError| e.to_string())
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
