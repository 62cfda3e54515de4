//! Boundary to the issue tracker.
//!
//! The network client that talks to the tracker lives outside this crate;
//! this module only defines what the cache needs from it. Raw records cross
//! the boundary as untyped JSON and are translated to
//! [`IssueRecord`](crate::domain::IssueRecord) by the cache.
//!
//! [`SnapshotClient`] is an in-memory implementation backed by a JSON Lines
//! export of raw records. It serves the CLI in offline mode and the tests.
//! [`RawIssueBuilder`] produces tracker-shaped records for synthetic
//! snapshots. [`child_query`] builds the search that finds children which
//! point up at their parent.
//!
//! # Example
//!
//! ```no_run
//! use issuetree::tracker::{SnapshotClient, TrackerClient};
//! use issuetree::domain::IssueKey;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, warnings) = SnapshotClient::load_jsonl(Path::new("issues.jsonl")).await?;
//!     for warning in &warnings {
//!         eprintln!("{warning}");
//!     }
//!
//!     let raw = client.get_issue(&IssueKey::new("PROJ-1")).await?;
//!     println!("{}", raw["fields"]["summary"]);
//!     Ok(())
//! }
//! ```

mod raw;
mod snapshot;

pub use raw::{RawIssueBuilder, raw_issue};
pub use snapshot::{DEFAULT_PAGE_SIZE, LoadWarning, SnapshotClient};

use crate::config::FieldMap;
use crate::domain::IssueKey;
use crate::domain::parse::PARENT_FIELD;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Raw issue records on this page
    pub issues: Vec<Value>,

    /// Cursor for the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

/// Tracker operations consumed by the issue cache.
///
/// Implementations must be `Send + Sync`; the cache may be shared by
/// concurrent requests. Neither method is retried by callers in this crate.
///
/// # Errors
///
/// - `Error::NotFound` when the tracker says the issue does not exist
/// - `Error::Upstream` for transport, authentication, or server failures
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Fetch one raw issue record.
    async fn get_issue(&self, key: &IssueKey) -> Result<Value>;

    /// Run a query and return one page of raw records.
    ///
    /// `fields` restricts which record fields are returned (empty means all;
    /// implementations may return more); `cursor` is the `next_cursor` of the
    /// previous page.
    async fn search(&self, query: &str, fields: &[&str], cursor: Option<&str>)
    -> Result<SearchPage>;
}

/// Query for issues that name `parent` in any parent-carrying field.
///
/// Epics and hierarchy parents hold no pointer to their children, so the
/// downward direction has to be searched. The query is one
/// `<field> = "<KEY>"` clause per field, joined by `OR`, using the raw field
/// names from `field_map`. Results may include issues whose authoritative
/// parent is a different, higher-precedence reference.
pub fn child_query(parent: &IssueKey, field_map: &FieldMap) -> String {
    [
        field_map.parent_link.as_str(),
        PARENT_FIELD,
        field_map.epic_link.as_str(),
    ]
    .iter()
    .map(|field| format!("{field} = \"{parent}\""))
    .collect::<Vec<_>>()
    .join(" OR ")
}
