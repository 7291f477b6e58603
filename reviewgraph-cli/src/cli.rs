use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use reviewgraph::{ReviewScope, Severity};

const DEFAULT_CHECKPOINT_DIR: &str = ".reviewgraph/checkpoints";

/// Staged code review with checkpointed, approvable fix generation
#[derive(Parser)]
#[command(name = "reviewgraph", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Review a repository
    Review {
        /// Path to the repository to review
        path: PathBuf,

        /// Analysis scope
        #[arg(long, value_enum, default_value_t = ScopeArg::Full)]
        scope: ScopeArg,

        /// Comma-separated list of files to analyze (implies `--scope files`)
        #[arg(long, value_delimiter = ',')]
        files: Vec<PathBuf>,

        /// Disable fix generation regardless of the repository config
        #[arg(long)]
        no_auto_fix: bool,

        /// Minimum severity included in the rendered report
        #[arg(long)]
        severity: Option<Severity>,

        /// Report format
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,

        /// Write the report to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Run identifier; generated when omitted
        #[arg(long)]
        run_id: Option<String>,

        /// Directory holding run checkpoints
        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: PathBuf,
    },

    /// Resume a paused run; resuming approves the pending fix generation
    Resume {
        /// Run identifier printed when the run paused
        run_id: String,

        /// Withdraw fix approval before resuming
        #[arg(long)]
        reject: bool,

        /// Report format
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,

        /// Write the report to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Directory holding run checkpoints
        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: PathBuf,
    },

    /// List runs with a saved checkpoint
    Runs {
        /// Directory holding run checkpoints
        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Full,
    Files,
}

impl From<ScopeArg> for ReviewScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Full => ReviewScope::Full,
            ScopeArg::Files => ReviewScope::Files,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Markdown,
    Json,
}
