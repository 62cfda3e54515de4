//! In-memory tracker client over a snapshot of raw records.

use super::{SearchPage, TrackerClient};
use crate::domain::IssueKey;
use crate::domain::parse::{raw_key, referenced_key};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default number of records per search page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Non-fatal problems found while loading a snapshot file.
///
/// The offending line is skipped; the rest of the file still loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line is not valid JSON
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// Line is JSON but has no `key`
    MissingKey {
        /// 1-based line number
        line_number: usize,
    },

    /// A later line repeated an earlier key; the later record wins
    DuplicateKey {
        /// The repeated key
        key: IssueKey,
        /// 1-based line number of the later record
        line_number: usize,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed JSON ({error})")
            }
            Self::MissingKey { line_number } => {
                write!(f, "line {line_number}: record has no key")
            }
            Self::DuplicateKey { key, line_number } => {
                write!(f, "line {line_number}: duplicate key {key}, keeping the later record")
            }
        }
    }
}

/// A [`TrackerClient`] serving raw records from memory.
///
/// Besides snapshot loading, it supports failure injection and counts calls
/// so tests can assert how often the cache reached the "network".
///
/// Supported search queries, all answered in insertion order:
/// - `*`: every record
/// - `key in (A, B, ...)`: the listed keys that exist
/// - `field = "KEY" OR field = "KEY" ...`: records whose raw `fields.<field>`
///   references the key, as produced by [`child_query`](super::child_query)
pub struct SnapshotClient {
    records: HashMap<IssueKey, Value>,
    order: Vec<IssueKey>,
    upstream_failures: HashMap<IssueKey, String>,
    fetches: Mutex<HashMap<IssueKey, usize>>,
    searches: AtomicUsize,
    page_size: usize,
}

impl SnapshotClient {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            upstream_failures: HashMap::new(),
            fetches: Mutex::new(HashMap::new()),
            searches: AtomicUsize::new(0),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Build a snapshot from raw records.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataShape` if a record has no key.
    pub fn from_records(records: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut client = Self::new();
        for raw in records {
            client.insert(raw)?;
        }
        Ok(client)
    }

    /// Load a JSON Lines file with one raw record per line.
    ///
    /// Blank lines are ignored. Malformed lines are skipped and reported as
    /// warnings instead of failing the whole load.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be opened or read.
    pub async fn load_jsonl(path: &Path) -> Result<(Self, Vec<LoadWarning>)> {
        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut client = Self::new();
        let mut warnings = Vec::new();
        let mut line_number = 0;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let raw: Value = match serde_json::from_str(&line) {
                Ok(raw) => raw,
                Err(e) => {
                    warnings.push(LoadWarning::MalformedJson {
                        line_number,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let Some(key) = raw_key(&raw) else {
                warnings.push(LoadWarning::MissingKey { line_number });
                continue;
            };

            if client.records.contains_key(&key) {
                warnings.push(LoadWarning::DuplicateKey {
                    key: key.clone(),
                    line_number,
                });
            }
            client.insert_keyed(key, raw);
        }

        tracing::debug!(
            path = %path.display(),
            records = client.records.len(),
            warnings = warnings.len(),
            "Loaded tracker snapshot"
        );

        Ok((client, warnings))
    }

    /// Add or replace a raw record.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataShape` if the record has no key.
    pub fn insert(&mut self, raw: Value) -> Result<IssueKey> {
        let key = raw_key(&raw).ok_or_else(|| Error::data_shape("<unknown>", "key", "is missing"))?;
        self.insert_keyed(key.clone(), raw);
        Ok(key)
    }

    fn insert_keyed(&mut self, key: IssueKey, raw: Value) {
        if self.records.insert(key.clone(), raw).is_none() {
            self.order.push(key);
        }
    }

    /// Remove a record so later fetches report `NotFound`.
    pub fn remove(&mut self, key: &IssueKey) -> Option<Value> {
        self.order.retain(|k| k != key);
        self.records.remove(key)
    }

    /// Make fetches of `key` fail with `Error::Upstream`.
    pub fn fail_upstream(&mut self, key: impl Into<IssueKey>, message: impl Into<String>) {
        self.upstream_failures.insert(key.into(), message.into());
    }

    /// Set the search page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// How many times `get_issue` was called for `key`.
    pub fn fetch_count(&self, key: &IssueKey) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Total `get_issue` calls across all keys.
    pub fn total_fetches(&self) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    /// Total `search` calls.
    pub fn search_calls(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    fn matching_keys(&self, query: &str) -> Result<Vec<&IssueKey>> {
        let query = query.trim();
        if query == "*" {
            return Ok(self.order.iter().collect());
        }

        if let Some(wanted) = parse_key_list(query) {
            return Ok(self.order.iter().filter(|k| wanted.contains(k)).collect());
        }

        let clauses = parse_field_clauses(query).ok_or_else(|| Error::Upstream {
            key: query.to_string(),
            message: "unsupported query".to_string(),
        })?;

        Ok(self
            .order
            .iter()
            .filter(|k| {
                self.records
                    .get(*k)
                    .is_some_and(|raw| matches_any_clause(raw, &clauses))
            })
            .collect())
    }
}

impl Default for SnapshotClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackerClient for SnapshotClient {
    async fn get_issue(&self, key: &IssueKey) -> Result<Value> {
        *self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert(0) += 1;

        if let Some(message) = self.upstream_failures.get(key) {
            return Err(Error::Upstream {
                key: key.to_string(),
                message: message.clone(),
            });
        }

        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    async fn search(
        &self,
        query: &str,
        _fields: &[&str],
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        self.searches.fetch_add(1, Ordering::Relaxed);

        let start = match cursor {
            Some(c) => c.parse::<usize>().map_err(|_| Error::Upstream {
                key: query.to_string(),
                message: format!("invalid cursor '{c}'"),
            })?,
            None => 0,
        };

        let keys = self.matching_keys(query)?;
        let end = (start + self.page_size).min(keys.len());
        let issues = keys
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .filter_map(|k| self.records.get(*k).cloned())
            .collect();
        let next_cursor = (end < keys.len()).then(|| end.to_string());

        Ok(SearchPage {
            issues,
            next_cursor,
        })
    }
}

/// Parse `key in (A, B, C)` (case-insensitive keywords) into its key list.
fn parse_key_list(query: &str) -> Option<Vec<IssueKey>> {
    let lower = query.to_ascii_lowercase();
    let rest = lower.strip_prefix("key")?.trim_start();
    rest.strip_prefix("in")?;

    let open = query.find('(')?;
    let close = query.rfind(')')?;
    if close < open {
        return None;
    }

    Some(
        query[open + 1..close]
            .split(',')
            .map(|k| k.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|k| !k.is_empty())
            .map(IssueKey::from)
            .collect(),
    )
}

/// Parse `field = "KEY" OR field = "KEY" ...` into `(field, key)` pairs.
///
/// Field names must be plain identifiers such as `parent` or
/// `customfield_12311140`.
fn parse_field_clauses(query: &str) -> Option<Vec<(String, IssueKey)>> {
    query
        .split(" OR ")
        .map(|clause| {
            let (field, value) = clause.split_once('=')?;
            let field = field.trim();
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            let plain = field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
            (plain && !field.is_empty() && !value.is_empty())
                .then(|| (field.to_string(), IssueKey::from(value)))
        })
        .collect()
}

fn matches_any_clause(raw: &Value, clauses: &[(String, IssueKey)]) -> bool {
    clauses.iter().any(|(field, wanted)| {
        raw.get("fields")
            .and_then(|fields| fields.get(field))
            .and_then(referenced_key)
            .is_some_and(|key| key == *wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldMap;
    use crate::tracker::{child_query, raw_issue};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn raw(key: &str) -> Value {
        json!({"key": key, "fields": {}})
    }

    #[tokio::test]
    async fn test_get_issue_counts_fetches() {
        let client = SnapshotClient::from_records([raw("A-1")]).unwrap();
        let key = IssueKey::new("A-1");

        client.get_issue(&key).await.unwrap();
        client.get_issue(&key).await.unwrap();

        assert_eq!(client.fetch_count(&key), 2);
        assert_eq!(client.total_fetches(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let client = SnapshotClient::new();
        let err = client.get_issue(&IssueKey::new("NOPE-1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_upstream_failure() {
        let mut client = SnapshotClient::from_records([raw("A-1")]).unwrap();
        client.fail_upstream("A-1", "401 Unauthorized");

        let err = client.get_issue(&IssueKey::new("A-1")).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_search_pages_through_everything() {
        let client = SnapshotClient::from_records((1..=5).map(|i| raw(&format!("A-{i}"))))
            .unwrap()
            .with_page_size(2);

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = client.search("*", &["key"], cursor.as_deref()).await.unwrap();
            seen.extend(page.issues.iter().filter_map(raw_key));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 5);
        assert_eq!(client.search_calls(), 3);
    }

    #[tokio::test]
    async fn test_search_key_list() {
        let client = SnapshotClient::from_records([raw("A-1"), raw("A-2"), raw("A-3")]).unwrap();
        let page = client
            .search("key in (A-3, 'A-1', MISSING-1)", &[], None)
            .await
            .unwrap();
        let keys: Vec<_> = page.issues.iter().filter_map(raw_key).collect();
        assert_eq!(keys, vec![IssueKey::new("A-1"), IssueKey::new("A-3")]);
    }

    #[tokio::test]
    async fn test_unsupported_query() {
        let client = SnapshotClient::new();
        assert!(client.search("status changed after -1d", &[], None).await.is_err());
        assert!(client.search("\"Epic Link\" = X", &[], None).await.is_err());
    }

    #[tokio::test]
    async fn test_child_query_matches_upward_references() {
        let client = SnapshotClient::from_records([
            raw_issue("EPIC-1").build(),
            raw_issue("STORY-1").epic_link("EPIC-1").build(),
            raw_issue("TASK-1").parent("EPIC-1").build(),
            raw_issue("FEAT-1").parent_link("EPIC-1").build(),
            raw_issue("STORY-2").epic_link("EPIC-2").build(),
        ])
        .unwrap();

        let query = child_query(&IssueKey::new("EPIC-1"), &FieldMap::default());
        let page = client.search(&query, &[], None).await.unwrap();
        let keys: Vec<_> = page.issues.iter().filter_map(raw_key).collect();

        assert_eq!(
            keys,
            vec![
                IssueKey::new("STORY-1"),
                IssueKey::new("TASK-1"),
                IssueKey::new("FEAT-1"),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_jsonl_reports_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"key": "A-1", "fields": {{}}}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"fields": {{}}}}"#).unwrap();
        writeln!(file, r#"{{"key": "A-1", "fields": {{"summary": "again"}}}}"#).unwrap();
        file.flush().unwrap();

        let (client, warnings) = SnapshotClient::load_jsonl(file.path()).await.unwrap();

        assert_eq!(client.len(), 1);
        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0], LoadWarning::MalformedJson { line_number: 2, .. }));
        assert_eq!(warnings[1], LoadWarning::MissingKey { line_number: 4 });
        assert!(matches!(warnings[2], LoadWarning::DuplicateKey { line_number: 5, .. }));

        let record = client.get_issue(&IssueKey::new("A-1")).await.unwrap();
        assert_eq!(record["fields"]["summary"], "again");
    }
}
