//! Output formatting for CLI commands.
//!
//! Every command prints either human-readable text or pretty JSON for
//! programmatic use. Text renderers write to any `io::Write` so they can be
//! exercised against a buffer.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers
//! - [`tree`]: Hierarchy tree rendering with ASCII/Unicode connectors

pub mod color;
pub mod tree;

use crate::domain::IssueKey;
use crate::report::{ReportEntry, StatusReport};
use crate::traversal::DanglingChild;
use color::{bold, colorize_key, colorize_rollup, dimmed, success, warning};
use serde::Serialize;
use std::collections::BTreeSet;
use std::env;
use std::io::{self, Write};

pub use tree::{TreeNode, write_tree};

const DEFAULT_MAX_CONTENT_WIDTH: usize = 80;

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Maximum content width for text wrapping.
    pub max_width: usize,
    /// Whether to use ASCII-only connectors instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(max_width: usize, use_ascii: bool, use_colors: bool) -> Self {
        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `ISSUETREE_MAX_WIDTH`: Maximum content width (default: 80)
    /// - `ISSUETREE_ASCII`: Set to "1" or "true" for ASCII-only connectors
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `ISSUETREE_COLOR`: Set to "0" or "false" to disable colors
    pub fn from_env() -> Self {
        let max_width = match env::var("ISSUETREE_MAX_WIDTH") {
            Ok(s) if !s.is_empty() => s.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    env_var = "ISSUETREE_MAX_WIDTH",
                    value = %s,
                    default = DEFAULT_MAX_CONTENT_WIDTH,
                    "Invalid value, using default"
                );
                DEFAULT_MAX_CONTENT_WIDTH
            }),
            _ => DEFAULT_MAX_CONTENT_WIDTH,
        };

        let use_ascii = env::var("ISSUETREE_ASCII")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        // https://no-color.org/
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("ISSUETREE_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_CONTENT_WIDTH,
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    write_json(&mut stdout.lock(), value)
}

/// Write any serializable value, slices included, as pretty JSON.
pub fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(w, "{json}")
}

/// Render a status report.
///
/// ```text
/// Status report: PROJ-1 Initiative (In Progress)
///   Overall: Blocked
///   Sub-issues: 3(OnTrack), 1(Blocked) - Total 4
///   Active contributors (2):
///     alice, bob
///   All contributors (3):
///     alice, bob, carol
///
/// PROJ-2 First epic (In Progress)
///   ...
/// ```
pub fn write_report<W: Write>(
    w: &mut W,
    report: &StatusReport,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{} {}", bold("Status report:", config), entry_heading(&report.root, config))?;
    write_entry_body(w, &report.root, config)?;

    for child in &report.children {
        writeln!(w)?;
        writeln!(w, "{}", entry_heading(child, config))?;
        write_entry_body(w, child, config)?;
    }

    if !report.skipped.is_empty() {
        writeln!(w)?;
        let keys: Vec<&str> = report.skipped.iter().map(IssueKey::as_str).collect();
        write_wrapped(w, &dimmed("Skipped inactive", config), &keys.join(", "), config)?;
    }
    Ok(())
}

fn entry_heading(entry: &ReportEntry, config: &OutputConfig) -> String {
    format!(
        "{} {} {}",
        colorize_key(entry.key.as_str(), config),
        entry.summary,
        dimmed(&format!("({})", entry.status), config)
    )
}

fn write_entry_body<W: Write>(
    w: &mut W,
    entry: &ReportEntry,
    config: &OutputConfig,
) -> io::Result<()> {
    let verdict = entry
        .rollup
        .verdict
        .map_or_else(|| dimmed("n/a", config), |v| colorize_rollup(v, config));
    writeln!(w, "  {} {verdict}", dimmed("Overall:", config))?;
    writeln!(w, "  {}", entry.rollup)?;
    write_contributors(w, "Active contributors", &entry.active_contributors, config)?;
    write_contributors(w, "All contributors", &entry.contributors, config)
}

fn write_contributors<W: Write>(
    w: &mut W,
    title: &str,
    contributors: &BTreeSet<String>,
    config: &OutputConfig,
) -> io::Result<()> {
    if contributors.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = contributors.iter().map(String::as_str).collect();
    let header = format!("  {title} ({}):", contributors.len());
    write_wrapped(w, &dimmed(&header, config), &names.join(", "), config)
}

/// Print `header` followed by `content` wrapped to the configured width.
fn write_wrapped<W: Write>(
    w: &mut W,
    header: &str,
    content: &str,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{header}")?;
    for line in textwrap::wrap(content, config.max_width.saturating_sub(4).max(20)) {
        writeln!(w, "    {line}")?;
    }
    Ok(())
}

/// Render a parent chain, nearest first.
pub fn write_ancestors<W: Write>(
    w: &mut W,
    key: &IssueKey,
    chain: &[IssueKey],
    config: &OutputConfig,
) -> io::Result<()> {
    if chain.is_empty() {
        return writeln!(w, "{} has no parent", colorize_key(key.as_str(), config));
    }
    let arrow = if config.use_ascii { " -> " } else { " → " };
    let rendered: Vec<String> = std::iter::once(key)
        .chain(chain)
        .map(|k| colorize_key(k.as_str(), config))
        .collect();
    writeln!(w, "{}", rendered.join(dimmed(arrow, config).as_str()))
}

/// Result of a hierarchy check, in the shape printed by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    /// Issues reached, root included
    pub issues: usize,
    /// Strongly connected groups of issues
    pub cycles: Vec<Vec<IssueKey>>,
    /// Issues with more than one parent
    pub shared_children: Vec<IssueKey>,
    /// Child references that did not resolve
    pub dangling: Vec<DanglingChild>,
}

impl CheckSummary {
    /// Returns `true` if nothing was found.
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.shared_children.is_empty() && self.dangling.is_empty()
    }
}

/// Render the result of a hierarchy check.
pub fn write_check<W: Write>(
    w: &mut W,
    root: &IssueKey,
    summary: &CheckSummary,
    config: &OutputConfig,
) -> io::Result<()> {
    let key = colorize_key(root.as_str(), config);
    if summary.is_clean() {
        let message = format!("hierarchy is well formed ({} issues)", summary.issues);
        return writeln!(w, "{key}: {}", success(&message, config));
    }

    writeln!(w, "{key}: {}", warning("hierarchy has problems", config))?;
    for cycle in &summary.cycles {
        let members: Vec<&str> = cycle.iter().map(IssueKey::as_str).collect();
        writeln!(w, "  cycle: {}", members.join(", "))?;
    }
    for shared in &summary.shared_children {
        writeln!(w, "  multiple parents: {shared}")?;
    }
    for dangling in &summary.dangling {
        writeln!(w, "  missing child: {} (listed by {})", dangling.child, dangling.parent)?;
    }
    Ok(())
}
