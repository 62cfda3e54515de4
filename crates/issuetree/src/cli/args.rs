//! CLI argument structs for all commands.

use clap::Parser;

use super::validators::{validate_issue_key, validate_stale_days};

/// Arguments for the `rollup` command
#[derive(Parser, Debug, Clone)]
pub struct RollupArgs {
    /// Issue to report on (e.g. an initiative or epic)
    #[arg(value_parser = validate_issue_key)]
    pub key: String,

    /// Days without an update before an open issue counts as stale
    ///
    /// Overrides `rollup.stale-after-days` from the configuration file.
    #[arg(long, value_parser = validate_stale_days)]
    pub stale_after_days: Option<i64>,

    /// Report direct children even when they are done or stale
    #[arg(long)]
    pub include_inactive: bool,
}

/// Arguments for the `descendants` command
#[derive(Parser, Debug, Clone)]
pub struct DescendantsArgs {
    /// Issue to start from
    #[arg(value_parser = validate_issue_key)]
    pub key: String,

    /// Stop expanding below this depth
    #[arg(long)]
    pub depth: Option<usize>,

    /// Print a sorted list of keys instead of a tree
    #[arg(long)]
    pub flat: bool,
}

/// Arguments for the `ancestors` command
#[derive(Parser, Debug, Clone)]
pub struct AncestorsArgs {
    /// Issue whose parent chain to print
    #[arg(value_parser = validate_issue_key)]
    pub key: String,
}

/// Arguments for the `check` command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Issue whose hierarchy to check
    #[arg(value_parser = validate_issue_key)]
    pub key: String,
}
