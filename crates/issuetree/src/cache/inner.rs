//! Cache state guarded by the outer mutex.

use super::CacheStats;
use crate::domain::{IssueKey, IssueRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// Inner cache structure (not thread-safe).
///
/// Wrapped in `Arc<Mutex<>>` by [`IssueCache`](super::IssueCache).
#[derive(Default)]
pub(super) struct CacheInner {
    /// Records indexed by the key they were requested under
    pub(super) entries: HashMap<IssueKey, Arc<IssueRecord>>,

    /// Children found by searching for upward references, per parent
    pub(super) referring_children: HashMap<IssueKey, Vec<IssueKey>>,

    pub(super) hits: u64,
    pub(super) misses: u64,
    pub(super) seeded: u64,
    pub(super) invalidations: u64,
}

impl CacheInner {
    /// Look up a cached record, counting a hit when found.
    pub(super) fn lookup(&mut self, key: &IssueKey) -> Option<Arc<IssueRecord>> {
        let record = self.entries.get(key).cloned()?;
        self.hits += 1;
        Some(record)
    }

    pub(super) fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            seeded: self.seeded,
            invalidations: self.invalidations,
        }
    }
}
