//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Clickstream session analysis.
///
/// Cuts per-user navigation logs into sessions that end on a target site,
/// splits them at unusual idle gaps and labels each navigation's role.
#[derive(Debug, Parser)]
#[command(name = "cs", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import navigation events from JSONL.
    Import {
        /// File to read; stdin when omitted.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Discard previously imported events first.
        #[arg(long)]
        replace: bool,
    },

    /// Segment stored events into sessions and store one record per session.
    Segment {
        /// Print the records as JSONL instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Label stored events with their session role.
    Label {
        /// Print the labeled rows as JSONL instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Show database contents and settings.
    Status,

    /// Export a stored result table as JSONL.
    Export {
        /// Table to export.
        #[arg(value_enum)]
        table: ExportTable,
    },
}

/// Result tables that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportTable {
    /// Subsession records from `cs segment`.
    Records,
    /// Role-labeled events from `cs label`.
    Roles,
}
