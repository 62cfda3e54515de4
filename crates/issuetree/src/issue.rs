//! Issue accessor with explicit, cache-backed relationship resolution.
//!
//! An [`Issue`] wraps a shared [`IssueRecord`] together with a [`Tracker`]
//! handle. Field access is synchronous; anything that has to look at another
//! issue (parent, children, linked issues) is an `async` method that goes
//! through the cache, so the point where a fetch may happen is visible at
//! the call site.
//!
//! Dangling references are not hidden: if a referenced key no longer exists
//! the method fails with `Error::NotFound`.

use crate::cache::IssueCache;
use crate::domain::{IssueKey, IssueLink, IssueRecord};
use crate::error::Result;
use crate::tracker::TrackerClient;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Relationship phrase for a parent's view of its sub-task.
pub const HAS_SUBTASK: &str = "has a sub-task";

/// A tracker client paired with the cache that fronts it.
///
/// Cheap to clone; clones share the same cache and client.
#[derive(Clone)]
pub struct Tracker {
    cache: IssueCache,
    client: Arc<dyn TrackerClient>,
}

impl Tracker {
    /// Pair `client` with `cache`.
    pub fn new(client: Arc<dyn TrackerClient>, cache: IssueCache) -> Self {
        Self { cache, client }
    }

    /// The shared cache.
    pub fn cache(&self) -> &IssueCache {
        &self.cache
    }

    /// The underlying tracker client.
    pub fn client(&self) -> &dyn TrackerClient {
        self.client.as_ref()
    }

    /// Get the cached record for `key`, fetching it on a miss.
    ///
    /// # Errors
    ///
    /// See [`IssueCache::get_issue`].
    pub async fn record(&self, key: &IssueKey) -> Result<Arc<IssueRecord>> {
        self.cache.get_issue(self.client.as_ref(), key).await
    }

    /// Get an accessor for `key`, fetching the record on a miss.
    ///
    /// # Errors
    ///
    /// See [`IssueCache::get_issue`].
    pub async fn issue(&self, key: &IssueKey) -> Result<Issue> {
        let record = self.record(key).await?;
        Ok(self.wrap(record))
    }

    /// Keys of the direct children of `record`.
    ///
    /// Sub-tasks come first, in tracker order, followed by issues whose
    /// authoritative parent is `record` (epic members, hierarchy children)
    /// in search order. Duplicates are dropped.
    ///
    /// # Errors
    ///
    /// See [`IssueCache::referring_children`].
    pub async fn child_keys(&self, record: &IssueRecord) -> Result<Vec<IssueKey>> {
        let mut keys = record.children.clone();
        for key in self
            .cache
            .referring_children(self.client.as_ref(), &record.key)
            .await?
        {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Wrap an already fetched record.
    pub fn wrap(&self, record: Arc<IssueRecord>) -> Issue {
        Issue {
            record,
            tracker: self.clone(),
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// A linked issue together with how it is linked.
#[derive(Debug, Clone)]
pub struct RelatedIssue {
    /// The link as recorded on the carrying issue
    pub link: IssueLink,

    /// The issue on the other end
    pub issue: Issue,
}

impl RelatedIssue {
    /// Relationship label read from the carrying issue's side
    /// ("blocks", "is blocked by", "relates to", ...).
    pub fn descriptor(&self) -> &str {
        self.link.descriptor()
    }
}

/// Kind of reference an issue holds to another issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The other issue is this issue's parent
    Parent,

    /// The other issue is a direct child
    Child,

    /// A generic issue link
    Link,
}

/// A reference to another issue, described without fetching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Key of the other issue
    pub key: IssueKey,

    /// Human-readable phrase, read as "<this issue> <how> <other issue>"
    pub how: String,

    /// What sort of reference this is
    pub kind: RelationKind,
}

/// Accessor over one cached issue.
///
/// Equality and hashing use the issue key only, so accessors can be
/// collected into sets.
#[derive(Clone)]
pub struct Issue {
    record: Arc<IssueRecord>,
    tracker: Tracker,
}

impl Issue {
    /// The underlying record.
    pub fn record(&self) -> &IssueRecord {
        &self.record
    }

    /// Shared handle to the underlying record.
    pub fn shared_record(&self) -> Arc<IssueRecord> {
        Arc::clone(&self.record)
    }

    /// The issue key.
    pub fn key(&self) -> &IssueKey {
        &self.record.key
    }

    /// The tracker this accessor resolves references through.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Key of the authoritative parent, without a lookup.
    pub fn parent_key(&self) -> Option<&IssueKey> {
        self.record.parent_key()
    }

    /// Resolve the authoritative parent.
    ///
    /// Returns `Ok(None)` when the issue has no parent.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the parent key is dangling; other cache errors
    /// propagate.
    pub async fn parent(&self) -> Result<Option<Issue>> {
        match self.record.parent_key() {
            Some(key) => Ok(Some(self.tracker.issue(key).await?)),
            None => Ok(None),
        }
    }

    /// Keys of the sub-tasks listed on the record, in tracker order.
    ///
    /// Children that only point upward at this issue are not included; see
    /// [`children`](Self::children).
    pub fn subtask_keys(&self) -> &[IssueKey] {
        &self.record.children
    }

    /// Resolve the direct children: sub-tasks first, then issues whose
    /// authoritative parent is this one.
    ///
    /// # Errors
    ///
    /// Fails if the child search fails, or on the first child that cannot
    /// be resolved.
    pub async fn children(&self) -> Result<Vec<Issue>> {
        let keys = self.tracker.child_keys(&self.record).await?;
        let mut children = Vec::with_capacity(keys.len());
        for key in &keys {
            children.push(self.tracker.issue(key).await?);
        }
        Ok(children)
    }

    /// Resolve every inward and outward link, in tracker order.
    ///
    /// # Errors
    ///
    /// Fails on the first link target that cannot be resolved.
    pub async fn related(&self) -> Result<Vec<RelatedIssue>> {
        let mut related = Vec::with_capacity(self.record.links.len());
        for link in &self.record.links {
            let issue = self.tracker.issue(&link.target).await?;
            related.push(RelatedIssue {
                link: link.clone(),
                issue,
            });
        }
        Ok(related)
    }

    /// Every issue this one references, described without any lookup.
    ///
    /// Order: links, then children, then the parent.
    pub fn relations(&self) -> Vec<Relation> {
        let links = self.record.links.iter().map(|link| Relation {
            key: link.target.clone(),
            how: link.descriptor().to_string(),
            kind: RelationKind::Link,
        });
        let children = self.record.children.iter().map(|key| Relation {
            key: key.clone(),
            how: HAS_SUBTASK.to_string(),
            kind: RelationKind::Child,
        });
        let parent = self.record.parent.iter().map(|parent| Relation {
            key: parent.key.clone(),
            how: parent.source.child_phrase().to_string(),
            kind: RelationKind::Parent,
        });

        links.chain(children).chain(parent).collect()
    }

    /// Deduplicated reporter, assignee, and comment authors.
    pub fn contributors(&self) -> BTreeSet<String> {
        self.record.contributors()
    }
}

impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.record.key == other.record.key
    }
}

impl Eq for Issue {}

impl Hash for Issue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record.key.hash(state);
    }
}

impl fmt::Debug for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issue")
            .field("key", &self.record.key)
            .field("status", &self.record.status)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.record, f)
    }
}
