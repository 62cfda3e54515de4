//! Graph traversal over the parent/child hierarchy.
//!
//! Downward traversal follows the **children** relation only: sub-tasks plus
//! issues whose authoritative parent is the issue being expanded (see
//! [`Tracker::child_keys`]). Links are never followed. Every walk keeps a
//! visited set, so malformed data with a child pointing back at an ancestor
//! terminates instead of looping.
//!
//! A child that the tracker no longer has is logged and skipped. The root
//! failing to resolve is always an error.

pub mod hierarchy;

use crate::domain::{IssueKey, IssueRecord};
use crate::error::Result;
use crate::issue::Tracker;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// One issue reached by a [`walk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkStep {
    /// The issue reached
    pub key: IssueKey,

    /// The issue it was reached from, `None` for the root
    pub parent: Option<IssueKey>,

    /// Distance from the root (root is 0)
    pub depth: usize,
}

/// A child reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingChild {
    /// The issue holding the reference
    pub parent: IssueKey,

    /// The key that was not found
    pub child: IssueKey,
}

/// Everything a breadth-first expansion observed.
#[derive(Debug, Default)]
pub(crate) struct Expansion {
    /// Reached issues in visiting order, root first
    pub(crate) steps: Vec<WalkStep>,

    /// Every resolved parent -> child reference, including ones that point
    /// at an already visited issue
    pub(crate) edges: Vec<(IssueKey, IssueKey)>,

    /// Child references that were not found
    pub(crate) dangling: Vec<DanglingChild>,
}

/// Breadth-first expansion from `root` along child references.
///
/// Issues at `max_depth` are reported but not expanded.
pub(crate) async fn expand(
    tracker: &Tracker,
    root: &IssueKey,
    max_depth: Option<usize>,
) -> Result<Expansion> {
    let root_record = tracker.record(root).await?;

    let mut expansion = Expansion::default();
    let mut visited: HashSet<IssueKey> = HashSet::from([root.clone()]);
    let mut missing: HashSet<IssueKey> = HashSet::new();
    let mut queue: VecDeque<(IssueKey, Arc<IssueRecord>, usize)> = VecDeque::new();

    expansion.steps.push(WalkStep {
        key: root.clone(),
        parent: None,
        depth: 0,
    });
    queue.push_back((root.clone(), root_record, 0));

    while let Some((key, record, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }

        for child in &tracker.child_keys(&record).await? {
            if missing.contains(child) {
                continue;
            }
            if !visited.insert(child.clone()) {
                tracing::debug!(parent = %key, child = %child, "Child already visited");
                expansion.edges.push((key.clone(), child.clone()));
                continue;
            }

            let child_record = match tracker.record(child).await {
                Ok(child_record) => child_record,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(parent = %key, child = %child, "Skipping missing child issue");
                    missing.insert(child.clone());
                    expansion.dangling.push(DanglingChild {
                        parent: key.clone(),
                        child: child.clone(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let next_depth = depth + 1;
            tracing::debug!(parent = %key, child = %child, depth = next_depth, "Walk step");
            expansion.edges.push((key.clone(), child.clone()));
            expansion.steps.push(WalkStep {
                key: child.clone(),
                parent: Some(key.clone()),
                depth: next_depth,
            });
            queue.push_back((child.clone(), child_record, next_depth));
        }
    }

    Ok(expansion)
}

/// Breadth-first walk from `root` down the children relation.
///
/// The root is the first step, at depth 0. Each issue appears once, with
/// the parent it was first reached from. With `max_depth` set, issues at
/// that depth are included but their children are not.
///
/// # Errors
///
/// Fails if `root` cannot be fetched, or with any non-`NotFound` error
/// while resolving a child.
pub async fn walk(
    tracker: &Tracker,
    root: &IssueKey,
    max_depth: Option<usize>,
) -> Result<Vec<WalkStep>> {
    Ok(expand(tracker, root, max_depth).await?.steps)
}

/// Every issue reachable from `root` via one or more child references.
///
/// The root itself is excluded, even when a malformed hierarchy leads back
/// to it. There is no depth bound.
///
/// # Errors
///
/// Same as [`walk`].
pub async fn descendants(tracker: &Tracker, root: &IssueKey) -> Result<HashSet<IssueKey>> {
    let steps = walk(tracker, root, None).await?;
    Ok(steps
        .into_iter()
        .filter(|step| step.key != *root)
        .map(|step| step.key)
        .collect())
}

/// Parent chain of `key`, nearest first.
///
/// The chain stops at the first issue without a parent, at a parent that
/// no longer exists, or where it would revisit an issue already in the
/// chain. The last two cases are logged.
///
/// # Errors
///
/// Fails if `key` itself cannot be fetched, or with any non-`NotFound`
/// error while resolving a parent.
pub async fn ancestors(tracker: &Tracker, key: &IssueKey) -> Result<Vec<IssueKey>> {
    let mut chain = Vec::new();
    let mut seen: HashSet<IssueKey> = HashSet::from([key.clone()]);
    let mut current = tracker.record(key).await?;

    while let Some(parent) = current.parent_key().cloned() {
        if !seen.insert(parent.clone()) {
            tracing::warn!(key = %key, parent = %parent, "Parent chain loops back on itself");
            break;
        }
        match tracker.record(&parent).await {
            Ok(record) => {
                chain.push(parent);
                current = record;
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(key = %current.key, parent = %parent, "Skipping missing parent issue");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(chain)
}

/// Number of ancestors above `key`; top-level issues are at level 0.
///
/// # Errors
///
/// Same as [`ancestors`].
pub async fn level(tracker: &Tracker, key: &IssueKey) -> Result<usize> {
    Ok(ancestors(tracker, key).await?.len())
}

/// Order `keys` deepest-first so children come before their parents.
///
/// Keys at the same level keep their input order.
///
/// # Errors
///
/// Same as [`ancestors`].
pub async fn bottom_up(tracker: &Tracker, keys: &[IssueKey]) -> Result<Vec<IssueKey>> {
    let mut leveled = Vec::with_capacity(keys.len());
    for key in keys {
        leveled.push((level(tracker, key).await?, key.clone()));
    }
    leveled.sort_by_key(|(level, _)| Reverse(*level));
    Ok(leveled.into_iter().map(|(_, key)| key).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::IssueCache;
    use crate::tracker::{SnapshotClient, raw_issue};
    use serde_json::Value;

    fn tracker(records: Vec<Value>) -> (Tracker, Arc<SnapshotClient>) {
        let client = Arc::new(SnapshotClient::from_records(records).unwrap());
        (Tracker::new(client.clone(), IssueCache::new()), client)
    }

    fn keys(items: &[&str]) -> HashSet<IssueKey> {
        items.iter().map(|k| IssueKey::new(*k)).collect()
    }

    #[tokio::test]
    async fn test_descendants_of_tree() {
        let (tracker, _) = tracker(vec![
            raw_issue("R-1").subtasks(&["R-2", "R-3"]).build(),
            raw_issue("R-2").subtask("R-4").build(),
            raw_issue("R-3").build(),
            raw_issue("R-4").build(),
        ]);

        let found = descendants(&tracker, &IssueKey::new("R-1")).await.unwrap();
        assert_eq!(found, keys(&["R-2", "R-3", "R-4"]));
    }

    #[tokio::test]
    async fn test_descendants_follow_upward_references() {
        let (tracker, _) = tracker(vec![
            raw_issue("I-1").issue_type("Initiative").build(),
            raw_issue("E-1").issue_type("Epic").parent_link("I-1").build(),
            raw_issue("S-1").epic_link("E-1").build(),
            raw_issue("S-2").epic_link("E-1").subtask("T-1").build(),
            raw_issue("T-1").parent("S-2").build(),
        ]);

        let found = descendants(&tracker, &IssueKey::new("I-1")).await.unwrap();
        assert_eq!(found, keys(&["E-1", "S-1", "S-2", "T-1"]));

        let chain = ancestors(&tracker, &IssueKey::new("T-1")).await.unwrap();
        assert_eq!(
            chain,
            vec![IssueKey::new("S-2"), IssueKey::new("E-1"), IssueKey::new("I-1")]
        );
    }

    #[tokio::test]
    async fn test_descendants_of_leaf_is_empty() {
        let (tracker, _) = tracker(vec![raw_issue("L-1").build()]);
        assert!(descendants(&tracker, &IssueKey::new("L-1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_terminates_and_excludes_root() {
        let (tracker, client) = tracker(vec![
            raw_issue("A").subtask("B").build(),
            raw_issue("B").subtask("A").build(),
        ]);

        let found = descendants(&tracker, &IssueKey::new("A")).await.unwrap();

        assert_eq!(found, keys(&["B"]));
        assert_eq!(client.fetch_count(&IssueKey::new("A")), 1);
    }

    #[tokio::test]
    async fn test_missing_child_is_skipped() {
        let (tracker, _) = tracker(vec![
            raw_issue("R-1").subtasks(&["GONE-1", "R-2"]).build(),
            raw_issue("R-2").build(),
        ]);

        let found = descendants(&tracker, &IssueKey::new("R-1")).await.unwrap();
        assert_eq!(found, keys(&["R-2"]));
    }

    #[tokio::test]
    async fn test_missing_root_fails() {
        let (tracker, _) = tracker(vec![]);
        let err = descendants(&tracker, &IssueKey::new("NOPE-1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upstream_child_failure_propagates() {
        let mut client = SnapshotClient::from_records([
            raw_issue("R-1").subtask("R-2").build(),
            raw_issue("R-2").build(),
        ])
        .unwrap();
        client.fail_upstream("R-2", "timeout");
        let tracker = Tracker::new(Arc::new(client), IssueCache::new());

        let err = descendants(&tracker, &IssueKey::new("R-1")).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_walk_depths_and_bound() {
        let (tracker, _) = tracker(vec![
            raw_issue("R-1").subtask("R-2").build(),
            raw_issue("R-2").subtask("R-3").build(),
            raw_issue("R-3").build(),
        ]);
        let root = IssueKey::new("R-1");

        let steps = walk(&tracker, &root, None).await.unwrap();
        let depths: Vec<_> = steps.iter().map(|s| (s.key.to_string(), s.depth)).collect();
        assert_eq!(
            depths,
            vec![
                ("R-1".to_string(), 0),
                ("R-2".to_string(), 1),
                ("R-3".to_string(), 2)
            ]
        );
        assert_eq!(steps[2].parent, Some(IssueKey::new("R-2")));

        let bounded = walk(&tracker, &root, Some(1)).await.unwrap();
        assert_eq!(bounded.len(), 2);
    }

    #[tokio::test]
    async fn test_ancestors_nearest_first() {
        let (tracker, _) = tracker(vec![
            raw_issue("I-1").issue_type("Initiative").build(),
            raw_issue("E-1").issue_type("Epic").parent_link("I-1").build(),
            raw_issue("S-1").epic_link("E-1").build(),
        ]);

        let chain = ancestors(&tracker, &IssueKey::new("S-1")).await.unwrap();
        assert_eq!(chain, vec![IssueKey::new("E-1"), IssueKey::new("I-1")]);
        assert_eq!(level(&tracker, &IssueKey::new("I-1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ancestors_stop_at_missing_parent() {
        let (tracker, _) = tracker(vec![
            raw_issue("E-1").parent_link("GONE-1").build(),
            raw_issue("S-1").epic_link("E-1").build(),
        ]);

        let chain = ancestors(&tracker, &IssueKey::new("S-1")).await.unwrap();
        assert_eq!(chain, vec![IssueKey::new("E-1")]);
    }

    #[tokio::test]
    async fn test_ancestors_stop_on_loop() {
        let (tracker, _) = tracker(vec![
            raw_issue("A").parent("B").build(),
            raw_issue("B").parent("A").build(),
        ]);

        let chain = ancestors(&tracker, &IssueKey::new("A")).await.unwrap();
        assert_eq!(chain, vec![IssueKey::new("B")]);
    }

    #[tokio::test]
    async fn test_bottom_up_orders_deepest_first() {
        let (tracker, _) = tracker(vec![
            raw_issue("I-1").build(),
            raw_issue("E-1").parent_link("I-1").build(),
            raw_issue("E-2").parent_link("I-1").build(),
            raw_issue("S-1").epic_link("E-1").build(),
        ]);
        let input = vec![
            IssueKey::new("I-1"),
            IssueKey::new("E-1"),
            IssueKey::new("S-1"),
            IssueKey::new("E-2"),
        ];

        let ordered = bottom_up(&tracker, &input).await.unwrap();
        assert_eq!(
            ordered,
            vec![
                IssueKey::new("S-1"),
                IssueKey::new("E-1"),
                IssueKey::new("E-2"),
                IssueKey::new("I-1"),
            ]
        );
    }
}
