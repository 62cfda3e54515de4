//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Done:        green
//!   - OnTrack:     cyan
//!   - NotStarted:  white
//!   - Stale:       yellow
//!   - Blocked:     red, bold
//!   - Issue keys:  cyan
//!   - Connectors:  dimmed

use crate::rollup::RollupStatus;
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Colorize a roll-up status label.
pub(crate) fn colorize_rollup(status: RollupStatus, config: &OutputConfig) -> String {
    let text = status.label();
    if !config.use_colors {
        return text.to_string();
    }
    match status {
        RollupStatus::Done => text.green().to_string(),
        RollupStatus::OnTrack => text.cyan().to_string(),
        RollupStatus::NotStarted => text.white().to_string(),
        RollupStatus::Stale => text.yellow().to_string(),
        RollupStatus::Blocked => text.red().bold().to_string(),
    }
}

/// Colorize an issue key (cyan).
pub(crate) fn colorize_key(key: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return key.to_string();
    }
    key.cyan().to_string()
}

/// Apply dimmed style to text (for labels and connectors).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}
