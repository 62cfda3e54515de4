//! Hierarchy tree rendering for `issuetree descendants` output.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use serde::Serialize;

use super::OutputConfig;
use super::color::{bold, colorize_key, dimmed};
use crate::domain::{IssueKey, IssueRecord};
use crate::traversal::WalkStep;

/// A node in a rendered hierarchy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Issue key
    pub key: IssueKey,
    /// Issue summary, when the record was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Workflow status name, when the record was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Children reached through this node, in walk order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Assemble a tree from walk steps.
    ///
    /// Returns `None` when `steps` is empty. Each step hangs under the
    /// parent it was first reached from, so the result is a tree even when
    /// the underlying hierarchy has cycles.
    pub fn from_walk(
        steps: &[WalkStep],
        records: &HashMap<IssueKey, Arc<IssueRecord>>,
    ) -> Option<Self> {
        let root = steps.first()?;
        let mut by_parent: HashMap<&IssueKey, Vec<&IssueKey>> = HashMap::new();
        for step in &steps[1..] {
            if let Some(parent) = &step.parent {
                by_parent.entry(parent).or_default().push(&step.key);
            }
        }
        Some(Self::assemble(&root.key, &by_parent, records))
    }

    fn assemble(
        key: &IssueKey,
        by_parent: &HashMap<&IssueKey, Vec<&IssueKey>>,
        records: &HashMap<IssueKey, Arc<IssueRecord>>,
    ) -> Self {
        let record = records.get(key);
        let children = by_parent
            .get(key)
            .map(|kids| {
                kids.iter()
                    .map(|kid| Self::assemble(kid, by_parent, records))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            key: key.clone(),
            summary: record.map(|r| r.summary.clone()),
            status: record.map(|r| r.status.clone()),
            children,
        }
    }
}

/// Render a hierarchy tree with ASCII/Unicode connectors.
///
/// ```text
/// ◆ PROJ-1 Initiative (In Progress)
/// ├── PROJ-2 First epic (To Do)
/// │   └── PROJ-4 Story (Closed)
/// └── PROJ-3 Second epic (In Progress)
/// ```
pub fn write_tree<W: Write>(w: &mut W, root: &TreeNode, config: &OutputConfig) -> io::Result<()> {
    let root_icon = if config.use_ascii { "*" } else { "◆" };
    writeln!(w, "{} {}", bold(root_icon, config), node_label(root, config))?;
    write_children(w, &root.children, &mut Vec::new(), config)
}

fn write_children<W: Write>(
    w: &mut W,
    children: &[TreeNode],
    prefix_segments: &mut Vec<bool>,
    config: &OutputConfig,
) -> io::Result<()> {
    let (branch, corner, pipe, space) = if config.use_ascii {
        ("|-- ", "`-- ", "|   ", "    ")
    } else {
        ("├── ", "└── ", "│   ", "    ")
    };

    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;

        let prefix: String = prefix_segments
            .iter()
            .map(|&has_more| dimmed(if has_more { pipe } else { space }, config))
            .collect();
        let connector = dimmed(if is_last { corner } else { branch }, config);
        writeln!(w, "{prefix}{connector}{}", node_label(child, config))?;

        if !child.children.is_empty() {
            prefix_segments.push(!is_last);
            write_children(w, &child.children, prefix_segments, config)?;
            prefix_segments.pop();
        }
    }
    Ok(())
}

fn node_label(node: &TreeNode, config: &OutputConfig) -> String {
    let mut label = colorize_key(node.key.as_str(), config);
    if let Some(summary) = &node.summary {
        label.push(' ');
        label.push_str(summary);
    }
    if let Some(status) = &node.status {
        label.push_str(&dimmed(&format!(" ({status})"), config));
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(key: &str, parent: Option<&str>, depth: usize) -> WalkStep {
        WalkStep {
            key: IssueKey::new(key),
            parent: parent.map(IssueKey::new),
            depth,
        }
    }

    fn render(root: &TreeNode, ascii: bool) -> String {
        let mut out = Vec::new();
        write_tree(&mut out, root, &OutputConfig::new(80, ascii, false)).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_empty_walk_has_no_tree() {
        assert!(TreeNode::from_walk(&[], &HashMap::new()).is_none());
    }

    #[test]
    fn test_tree_rendering_ascii() {
        let steps = vec![
            step("R", None, 0),
            step("A", Some("R"), 1),
            step("B", Some("R"), 1),
            step("C", Some("A"), 2),
        ];
        let tree = TreeNode::from_walk(&steps, &HashMap::new()).unwrap();

        assert_eq!(render(&tree, true), "* R\n|-- A\n|   `-- C\n`-- B\n");
    }

    #[test]
    fn test_tree_rendering_unicode() {
        let steps = vec![step("R", None, 0), step("A", Some("R"), 1)];
        let tree = TreeNode::from_walk(&steps, &HashMap::new()).unwrap();

        assert_eq!(render(&tree, false), "◆ R\n└── A\n");
    }
}
