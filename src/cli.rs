//! Command-line interface definitions for the maintenance tool.
//!
//! The `pcapcache` binary is an operator surface over the analysis cache:
//! inspecting what is cached for a capture, reporting statistics and running
//! the maintenance operations (eviction, per-file deletion, compaction).
//!
//! # Example
//!
//! ```bash
//! # Show which results are cached for a capture
//! pcapcache status ~/captures/office.pcapng
//!
//! # Evict entries not used in 14 days
//! pcapcache evict --older-than 14
//!
//! # Statistics as JSON, against a specific store file
//! pcapcache --db /tmp/cache.db stats --json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::ResultKind;

/// Inspect and maintain the packet-capture analysis result cache.
#[derive(Debug, Parser)]
#[command(name = "pcapcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the cache store
    ///
    /// Overrides the configured location and enables the cache even if the
    /// configuration disables it.
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the cache key of a capture file
    Key(FileArgs),
    /// Show which results are cached for a capture file
    Status(FileArgs),
    /// Load and summarize a cached result
    Show(ShowArgs),
    /// Print cache statistics
    Stats(StatsArgs),
    /// Remove entries that have not been used recently
    Evict(EvictArgs),
    /// Remove every cached result of one capture file
    Forget(ForgetArgs),
    /// Remove every entry
    Clear(ClearArgs),
    /// Reclaim disk space after deletions
    Compact,
    /// Print the effective configuration as TOML
    Config,
}

/// A single capture file argument.
#[derive(Debug, Args)]
pub struct FileArgs {
    /// Capture file
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
}

/// Arguments for the show subcommand.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Capture file
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Which result to show
    #[arg(short, long, value_enum, default_value = "threats")]
    pub kind: KindArg,
}

/// Arguments for the stats subcommand.
#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the evict subcommand.
#[derive(Debug, Args)]
pub struct EvictArgs {
    /// Age threshold in days (default: `max_age_days` from the configuration)
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u32>,
}

/// Arguments for the forget subcommand.
#[derive(Debug, Args)]
pub struct ForgetArgs {
    /// Capture file, or the hex file digest printed by `key`
    #[arg(value_name = "FILE|DIGEST")]
    pub target: String,
}

/// Arguments for the clear subcommand.
#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Confirm removal of every entry
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Result kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Security findings
    Threats,
    /// Voice quality-of-service metrics
    VoiceQos,
}

impl From<KindArg> for ResultKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Threats => ResultKind::Threats,
            KindArg::VoiceQos => ResultKind::VoiceQos,
        }
    }
}
