//! CLI command definitions and parsing
//!
//! Session state lives in memory for the lifetime of the process, so the
//! session controls (scope, pin, route override) are interactive commands
//! inside `chat` rather than standalone subcommands.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scolia",
    version,
    about = "Retrieval-and-routing engine for conversational textbook Q&A",
    long_about = "Scolia answers questions against a pre-indexed textbook corpus: it decides per \
                  question whether retrieval is needed, fuses lexical and semantic rankings, and \
                  keeps a per-conversation scope (chapter focus, pinned blocks) across turns."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/scolia/config.toml)
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

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question
    Ask {
        /// Question text
        question: String,

        /// Restrict to a chapter
        #[arg(long)]
        chapter: Option<String>,

        /// Restrict to a block kind (theoreme, definition, ...)
        #[arg(long)]
        kind: Option<String>,

        /// Restrict to a block label (e.g. 28.7)
        #[arg(long)]
        block: Option<String>,

        /// Restrict to a document type (theory, exercise, method, example)
        #[arg(long)]
        doc_type: Option<String>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive conversation; session controls are slash commands
    /// (/scope, /pin, /unpin, /route, /new, /quit)
    Chat,

    /// Build the lexical index from the chunk catalog
    Index {
        /// Catalog file (defaults to corpus.catalog_file from the config)
        #[arg(long)]
        catalog: Option<PathBuf>,
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

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard location)
        file: Option<PathBuf>,
    },
}
