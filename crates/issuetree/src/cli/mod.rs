//! CLI argument parsing and command dispatch.
//!
//! Every command works offline against a JSON Lines snapshot of raw tracker
//! records.
//!
//! # Commands
//!
//! - `rollup`: Status report for an issue and each of its direct children
//! - `descendants`: Everything below an issue, as a tree or a flat list
//! - `ancestors`: The parent chain of an issue
//! - `check`: Report cycles and other hierarchy problems
//!
//! # Global Flags
//!
//! - `--snapshot FILE`: JSON Lines export to read issues from
//! - `--config FILE`: Configuration file (default: `./issuetree.yaml` if present)
//! - `--json`: Output in JSON format
//!
//! # Example
//!
//! ```bash
//! issuetree --snapshot issues.jsonl rollup PROJ-1
//! issuetree --snapshot issues.jsonl descendants PROJ-1 --depth 2
//! issuetree --snapshot issues.jsonl --json check PROJ-1
//! ```

mod args;
mod execute;
mod validators;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{AncestorsArgs, CheckArgs, DescendantsArgs, RollupArgs};
pub use validators::{validate_issue_key, validate_stale_days};

/// issuetree - Issue hierarchy traversal and status roll-up
///
/// Walks parent/child links in an issue tracker export and rolls the
/// status of everything below an issue up into one verdict.
#[derive(Parser, Debug)]
#[command(name = "issuetree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// JSON Lines snapshot of raw tracker records
    #[arg(short, long, global = true, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Status report for an issue and each of its direct children
    ///
    /// For every direct child, prints the roll-up of its descendants and
    /// who contributed. Done or stale children are skipped unless
    /// `--include-inactive` is given.
    Rollup(RollupArgs),

    /// List everything below an issue
    Descendants(DescendantsArgs),

    /// Print the parent chain of an issue, nearest first
    Ancestors(AncestorsArgs),

    /// Check the hierarchy below an issue for cycles, issues with several
    /// parents, and missing children
    Check(CheckArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse from an explicit argument list (used in tests)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the parsed command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("issuetree: issue hierarchy traversal and status roll-up");
            println!("Use --help for more information");
            return Ok(());
        };

        let snapshot = self
            .snapshot
            .as_deref()
            .context("--snapshot FILE is required")?;
        let app = App::open(snapshot, self.config.as_deref())
            .await
            .with_context(|| format!("Failed to open snapshot {}", snapshot.display()))?;

        match command {
            Commands::Rollup(args) => execute::execute_rollup(&app, args, output_mode).await,
            Commands::Descendants(args) => {
                execute::execute_descendants(&app, args, output_mode).await
            }
            Commands::Ancestors(args) => execute::execute_ancestors(&app, args, output_mode).await,
            Commands::Check(args) => execute::execute_check(&app, args, output_mode).await,
        }
    }
}
