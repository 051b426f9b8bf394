//! CLI definitions using clap.

use crate::config::RecallMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Mnemo CLI - conversational memory and recall for interactive assistants
#[derive(Parser, Debug)]
#[command(name = "mnemo", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: from config.json)
    #[arg(long, global = true, env = "MNEMO_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON (for agent integration)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config file and memory store
    Init {
        /// Overwrite an existing config file with defaults
        #[arg(long)]
        force: bool,
    },

    /// Print store totals and capability flags
    Status,

    /// Index one session (or the full backlog with index-all)
    Index {
        /// Session id to index
        id: Option<String>,
    },

    /// Index every session that has never been indexed
    IndexAll,

    /// Ingest legacy wire-format session logs
    Import {
        /// Parse and count without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Recall past sessions related to a query (or to piped context)
    Recall {
        /// Free-form query; omit it and pipe context on stdin instead
        query: Option<String>,

        /// Show session ids and longer previews
        #[arg(long)]
        verbose: bool,

        /// List recent sessions instead of searching
        #[arg(long)]
        list: bool,

        /// Show store statistics instead of searching
        #[arg(long)]
        stats: bool,

        /// Recall mode; persisted for later runs
        #[arg(long, value_enum)]
        mode: Option<RecallMode>,
    },

    /// Emit the context block for results of the last recall
    RecallApply {
        /// Selection like `2`, `1,3-5`, or `all`
        selection: String,
    },

    /// Fetch and render one session with its messages
    Session {
        /// Session id
        id: String,
    },

    /// Print the effective configuration
    Config,
}
