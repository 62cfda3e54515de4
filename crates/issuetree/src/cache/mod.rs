//! Process-wide memoization of fetched issue records.
//!
//! The cache maps [`IssueKey`] to a shared [`IssueRecord`]. A key is fetched
//! from the tracker at most once per cache lifetime unless it is explicitly
//! invalidated, and every lookup hands out the same `Arc`, so callers share
//! one record instead of deep copies.
//!
//! # Translation point
//!
//! Raw tracker JSON is turned into an `IssueRecord` here and nowhere else,
//! both for fetched records and for records [seeded](IssueCache::seed) from
//! bulk search results. Malformed records fail with `Error::DataShape` and
//! are never inserted.
//!
//! # Children that point upward
//!
//! Stories name their epic and epics name their hierarchy parent, but the
//! parent record carries no list of them. [`referring_children`] finds those
//! children with one search per parent, caches every record the search
//! returned, and memoizes the resulting key list until the parent is
//! invalidated.
//!
//! [`referring_children`]: IssueCache::referring_children
//!
//! # Thread Safety
//!
//! State lives behind `Arc<tokio::sync::Mutex<CacheInner>>`. The guard is
//! held across the whole check-fetch-insert sequence of
//! [`get_issue`](IssueCache::get_issue), so two requests racing on the same
//! cold key cannot corrupt the map or insert twice. Concurrent misses on
//! different keys are serialized as well; the cache is built for a handful
//! of concurrent requests, not for fetch parallelism.
//!
//! # Example
//!
//! ```no_run
//! use issuetree::cache::IssueCache;
//! use issuetree::domain::IssueKey;
//! use issuetree::tracker::SnapshotClient;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SnapshotClient::new();
//!     let cache = IssueCache::new();
//!
//!     let issue = cache.get_issue(&client, &IssueKey::new("PROJ-1")).await?;
//!     println!("{issue}");
//!     println!("{}", cache.stats().await);
//!     Ok(())
//! }
//! ```

mod inner;

use crate::config::FieldMap;
use crate::domain::parse::parse_record;
use crate::domain::{IssueKey, IssueRecord};
use crate::error::Result;
use crate::tracker::{TrackerClient, child_query};
use inner::CacheInner;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Records currently cached
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that went to the tracker
    pub misses: u64,
    /// Records inserted via `seed`
    pub seeded: u64,
    /// Entries removed via `invalidate`/`invalidate_all`
    pub invalidations: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache, `0.0` when there were none.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses ({:.0}% hit rate), {} seeded, {} invalidated",
            self.entries,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.seeded,
            self.invalidations
        )
    }
}

/// Shared issue cache.
///
/// Cloning is cheap and yields a handle to the same underlying store, so one
/// cache can be handed to every request a process serves. Tests construct
/// their own instance per case.
#[derive(Clone)]
pub struct IssueCache {
    inner: Arc<Mutex<CacheInner>>,
    field_map: Arc<FieldMap>,
}

impl IssueCache {
    /// Create an empty cache using the default tracker field names.
    pub fn new() -> Self {
        Self::with_field_map(FieldMap::default())
    }

    /// Create an empty cache that translates records with `field_map`.
    pub fn with_field_map(field_map: FieldMap) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            field_map: Arc::new(field_map),
        }
    }

    /// Field names used for record translation.
    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// Get an issue, fetching it from `client` on a miss.
    ///
    /// On a miss exactly one `client.get_issue` call is made; nothing is
    /// retried.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the tracker has no such issue
    /// - `Error::Upstream` on transport or authentication failure
    /// - `Error::DataShape` if the fetched record is malformed
    pub async fn get_issue(
        &self,
        client: &dyn TrackerClient,
        key: &IssueKey,
    ) -> Result<Arc<IssueRecord>> {
        let mut inner = self.inner.lock().await;

        if let Some(record) = inner.lookup(key) {
            tracing::debug!(key = %key, "Issue cache hit");
            return Ok(record);
        }

        tracing::debug!(key = %key, "Issue cache miss, fetching");
        inner.misses += 1;
        let raw = client.get_issue(key).await?;
        let record = Arc::new(parse_record(&raw, &self.field_map)?);
        if record.key != *key {
            tracing::debug!(requested = %key, returned = %record.key, "Tracker returned a renamed issue");
        }
        inner.entries.insert(key.clone(), Arc::clone(&record));
        tracing::info!(key = %key, "Retrieved issue: {}", record.summary);

        Ok(record)
    }

    /// Drop any cached copy of `key` and fetch it again.
    ///
    /// # Errors
    ///
    /// Same as [`get_issue`](Self::get_issue).
    pub async fn refresh(
        &self,
        client: &dyn TrackerClient,
        key: &IssueKey,
    ) -> Result<Arc<IssueRecord>> {
        self.invalidate(key).await;
        self.get_issue(client, key).await
    }

    /// Return the cached record for `key` without contacting the tracker.
    pub async fn peek(&self, key: &IssueKey) -> Option<Arc<IssueRecord>> {
        let inner = self.inner.lock().await;
        inner.entries.get(key).cloned()
    }

    /// Insert a pre-fetched raw record, keyed by the record's own key.
    ///
    /// Used to pre-warm the cache from bulk search results so those issues do
    /// not trigger individual fetches later. An existing entry for the same
    /// key is replaced, since a seeded record is at least as fresh.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataShape` if the record is malformed; the cache is
    /// left unchanged in that case.
    pub async fn seed(&self, raw: &Value) -> Result<Arc<IssueRecord>> {
        let record = Arc::new(parse_record(raw, &self.field_map)?);
        let mut inner = self.inner.lock().await;
        inner.seeded += 1;
        inner
            .entries
            .insert(record.key.clone(), Arc::clone(&record));
        tracing::debug!(key = %record.key, "Seeded issue cache");
        Ok(record)
    }

    /// Run `query` through the tracker's search and seed every result.
    ///
    /// Pages are followed until the tracker reports no further cursor.
    /// Returns the keys seeded, in result order.
    ///
    /// # Errors
    ///
    /// Propagates search failures and `Error::DataShape` from the first
    /// malformed record; records seeded before the failure stay cached.
    pub async fn warm(&self, client: &dyn TrackerClient, query: &str) -> Result<Vec<IssueKey>> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = client.search(query, &[], cursor.as_deref()).await?;
            for raw in &page.issues {
                keys.push(self.seed(raw).await?.key.clone());
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(query, seeded = keys.len(), "Warmed issue cache");
        Ok(keys)
    }

    /// Keys of issues whose authoritative parent is `parent`, found by
    /// searching for upward references (parent link, `parent`, epic link).
    ///
    /// The first call per parent runs [`child_query`] through the tracker's
    /// search, following every page. Returned records are cached unless the
    /// key is already cached, so shared records are never swapped out.
    /// Records whose authoritative parent is a different issue are cached
    /// but not returned. Later calls answer from the memoized key list.
    ///
    /// # Errors
    ///
    /// Propagates search failures and `Error::DataShape` from a malformed
    /// result; nothing is memoized in that case.
    pub async fn referring_children(
        &self,
        client: &dyn TrackerClient,
        parent: &IssueKey,
    ) -> Result<Vec<IssueKey>> {
        if let Some(keys) = self.inner.lock().await.referring_children.get(parent) {
            return Ok(keys.clone());
        }

        let query = child_query(parent, &self.field_map);
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = client.search(&query, &[], cursor.as_deref()).await?;
            for raw in &page.issues {
                let record = self.adopt(raw).await?;
                if record.parent_key() == Some(parent) && record.key != *parent {
                    keys.push(record.key.clone());
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!(parent = %parent, children = keys.len(), "Resolved referring children");
        self.inner
            .lock()
            .await
            .referring_children
            .insert(parent.clone(), keys.clone());
        Ok(keys)
    }

    /// Cache a raw search result unless its key is already cached.
    async fn adopt(&self, raw: &Value) -> Result<Arc<IssueRecord>> {
        let record = Arc::new(parse_record(raw, &self.field_map)?);
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.entries.get(&record.key) {
            return Ok(Arc::clone(existing));
        }
        inner.seeded += 1;
        inner
            .entries
            .insert(record.key.clone(), Arc::clone(&record));
        Ok(record)
    }

    /// Remove one entry and its memoized children. Returns `true` if the
    /// record was cached.
    pub async fn invalidate(&self, key: &IssueKey) -> bool {
        let mut inner = self.inner.lock().await;
        inner.referring_children.remove(key);
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.invalidations += 1;
            tracing::debug!(key = %key, "Invalidated cached issue");
        }
        removed
    }

    /// Remove every entry.
    pub async fn invalidate_all(&self) {
        let mut inner = self.inner.lock().await;
        let count = inner.entries.len();
        inner.entries.clear();
        inner.referring_children.clear();
        inner.invalidations += count as u64;
        tracing::debug!(count, "Invalidated entire issue cache");
    }

    /// Returns `true` if `key` is cached.
    pub async fn contains(&self, key: &IssueKey) -> bool {
        self.inner.lock().await.entries.contains_key(key)
    }

    /// Number of cached records.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats()
    }
}

impl Default for IssueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IssueCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssueCache")
            .field("field_map", &self.field_map)
            .finish_non_exhaustive()
    }
}
