//! Domain types for the issue graph.
//!
//! This module contains the typed view of a tracker issue. Raw tracker
//! records are translated into [`IssueRecord`] exactly once, in [`parse`],
//! at the cache boundary; everything past that point works with validated
//! fields only.

pub mod parse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for an issue (e.g. `PROJ-123`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueKey(pub String);

impl IssueKey {
    /// Create a new issue key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IssueKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Coarse workflow category reported by the tracker for an issue's status.
///
/// Status names are free-form per project ("Backlog", "Code Review", ...);
/// the category is the closed set every status maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Work has not started
    New,

    /// Work is underway
    InProgress,

    /// Work is complete
    Done,
}

impl StatusCategory {
    /// Map a tracker status-category key (`new`, `indeterminate`, `done`).
    pub fn from_tracker_key(key: &str) -> Option<Self> {
        match key {
            "new" => Some(Self::New),
            "indeterminate" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Which record field supplied an issue's parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentSource {
    /// Portfolio hierarchy field ("Parent Link")
    Hierarchy,

    /// The tracker's built-in `parent` field (sub-tasks, next-gen projects)
    Parent,

    /// Epic link custom field
    EpicLink,
}

impl ParentSource {
    /// Phrase describing the child's side of the relationship.
    pub fn child_phrase(self) -> &'static str {
        match self {
            Self::Hierarchy => "is a child of the parent issue",
            Self::Parent => "is a sub-task of",
            Self::EpicLink => "is a child of the Epic issue",
        }
    }
}

/// The authoritative parent of an issue and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    /// Key of the parent issue
    pub key: IssueKey,

    /// Field the parent was taken from
    pub source: ParentSource,
}

/// Direction of a link as seen from the issue that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// The other issue is the link's source (we read the inward phrase)
    Inward,

    /// The other issue is the link's target (we read the outward phrase)
    Outward,
}

/// A tracker link type with its two directional phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkType {
    /// Link type name (e.g. "Blocks")
    pub name: String,

    /// Phrase read from the target's side (e.g. "is blocked by")
    pub inward: String,

    /// Phrase read from the source's side (e.g. "blocks")
    pub outward: String,
}

/// A link from one issue to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLink {
    /// The link type
    pub link_type: LinkType,

    /// Which phrase applies from the carrying issue's point of view
    pub direction: LinkDirection,

    /// The issue on the other end
    pub target: IssueKey,

    /// Status category of the other end, when the tracker embedded it
    pub target_status: Option<StatusCategory>,
}

impl IssueLink {
    /// The human-readable relationship label from the carrying issue's side.
    ///
    /// For issue A with an inward "Blocks" link to B this reads
    /// "is blocked by", so "A is blocked by B".
    pub fn descriptor(&self) -> &str {
        match self.direction {
            LinkDirection::Inward => &self.link_type.inward,
            LinkDirection::Outward => &self.link_type.outward,
        }
    }

    /// Returns `true` if the other end of this link blocks the carrying issue.
    pub fn is_blocked_by(&self) -> bool {
        let blocks_type = self.link_type.name.eq_ignore_ascii_case("blocks")
            || self.link_type.outward.eq_ignore_ascii_case("blocks");
        (blocks_type && self.direction == LinkDirection::Inward)
            || self.descriptor().eq_ignore_ascii_case("is blocked by")
    }
}

/// Normalized view of one tracker issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Unique key
    pub key: IssueKey,

    /// Issue type name (Epic, Story, Task, Sub-task, ...)
    pub issue_type: String,

    /// Status name as shown in the tracker's workflow
    pub status: String,

    /// Workflow category of the status
    pub status_category: StatusCategory,

    /// Priority name, if the project uses priorities
    pub priority: Option<String>,

    /// One-line summary
    pub summary: String,

    /// Labels
    pub labels: Vec<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,

    /// Authoritative parent, after precedence resolution
    pub parent: Option<ParentRef>,

    /// Sub-task keys in tracker order
    pub children: Vec<IssueKey>,

    /// Inward and outward links in tracker order
    pub links: Vec<IssueLink>,

    /// Reporter's user identifier
    pub reporter: Option<String>,

    /// Assignee's user identifier
    pub assignee: Option<String>,

    /// Comment authors' user identifiers, in comment order (may repeat)
    pub comment_authors: Vec<String>,
}

impl IssueRecord {
    /// Returns `true` if the status category is `Done`.
    pub fn is_done(&self) -> bool {
        self.status_category == StatusCategory::Done
    }

    /// Key of the authoritative parent, without any lookup.
    pub fn parent_key(&self) -> Option<&IssueKey> {
        self.parent.as_ref().map(|p| &p.key)
    }

    /// Links whose other end blocks this issue.
    pub fn blocking_links(&self) -> impl Iterator<Item = &IssueLink> {
        self.links.iter().filter(|link| link.is_blocked_by())
    }

    /// Deduplicated set of everyone who reported, owns, or commented on the issue.
    pub fn contributors(&self) -> BTreeSet<String> {
        self.reporter
            .iter()
            .chain(self.assignee.iter())
            .chain(self.comment_authors.iter())
            .cloned()
            .collect()
    }
}

impl fmt::Display for IssueRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.key, self.summary, self.status)
    }
}
