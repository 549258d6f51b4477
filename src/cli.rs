//! Command-line interface definitions for chaindupe.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, config) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Scan two directories with the default chain (size, blake3)
//! chaindupe scan ~/Pictures /mnt/backup/Pictures
//!
//! # Cheapest first: size, then the leading chunks, then the full hash
//! chaindupe scan ~/Downloads -f size -f partial -f blake3
//!
//! # Read candidates from a manifest and emit JSON lines
//! chaindupe scan files.txt --output json
//!
//! # Verbose mode for debugging
//! chaindupe -v scan ~/Downloads
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::duplicates::SignatureKind;

/// Find duplicate files with a chain of progressively more expensive comparisons.
///
/// Each root is either a directory to walk or a manifest file listing one
/// path per line.
#[derive(Debug, Parser)]
#[command(name = "chaindupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as a JSON object on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Named `[profile.NAME]` table from the configuration file to apply
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicate files under one or more roots
    Scan(ScanArgs),
    /// List the available signature functions
    Signatures,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Directories to walk or manifest files to read
    #[arg(value_name = "ROOT", required = true, num_args = 1..)]
    pub roots: Vec<PathBuf>,

    /// Only look at the files directly inside each directory root
    #[arg(long)]
    pub no_recursive: bool,

    /// Maximum number of directory levels to yield files from (0 = unlimited)
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Walk into hidden directories
    #[arg(long)]
    pub hidden: bool,

    /// Basename glob; matching files are always kept (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Basename glob; matching files are skipped unless included (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Directory substring that must appear for files to be kept (repeatable)
    #[arg(long = "dir-include", value_name = "SUBSTRING")]
    pub dir_include: Vec<String>,

    /// Directory substring; files are skipped when all of them appear (repeatable)
    #[arg(long = "dir-exclude", value_name = "SUBSTRING")]
    pub dir_exclude: Vec<String>,

    /// Admit symbolic links as candidates
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Admit empty files as candidates
    #[arg(long)]
    pub empty_files: bool,

    /// Signature function to apply, in order (repeatable, default: size, blake3)
    #[arg(short = 'f', long = "filter", value_enum, value_name = "NAME")]
    pub filters: Vec<SignatureKind>,

    /// Smallest group size to report (default: 2, use 1 to list files split off at a later stage)
    #[arg(short = 'g', long, value_name = "N")]
    pub group_size: Option<usize>,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Number of 64 KiB chunks read by the `partial` signature (default: 200)
    #[arg(long, value_name = "N")]
    pub partial_chunks: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Print each group's signatures above its paths (text output)
    #[arg(long)]
    pub labels: bool,

    /// Indent JSON objects instead of writing one per line (json output)
    #[arg(long)]
    pub pretty: bool,

    /// Show a progress spinner on stderr
    #[arg(long)]
    pub progress: bool,
}

/// Output format for groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One path per line, blank line between groups
    #[default]
    Text,
    /// One JSON object per group, one per line
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
