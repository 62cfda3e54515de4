//! Application context for CLI command execution.
//!
//! Loads configuration and a JSON Lines snapshot, and wires them into a
//! [`Tracker`] the commands run against.
//!
//! # Example
//!
//! ```no_run
//! use issuetree::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::open(Path::new("issues.jsonl"), None).await?;
//!     println!("{} issues loaded", app.issue_count());
//!     Ok(())
//! }
//! ```

use crate::cache::IssueCache;
use crate::config::{CONFIG_FILE_NAME, IssuetreeConfig};
use crate::error::Result;
use crate::issue::Tracker;
use crate::tracker::SnapshotClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context for CLI operations.
#[derive(Debug)]
pub struct App {
    tracker: Tracker,
    config: IssuetreeConfig,
    snapshot_path: PathBuf,
    issue_count: usize,
}

impl App {
    /// Load a snapshot and configuration.
    ///
    /// With no `config_path`, `issuetree.yaml` in the current directory is
    /// used if present, otherwise defaults. Snapshot lines that cannot be
    /// used are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot or configuration cannot be read, or
    /// the configuration is invalid.
    pub async fn open(snapshot_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => IssuetreeConfig::load(path).await?,
            None => Self::discover_config(&std::env::current_dir()?).await?,
        };

        let (client, warnings) = SnapshotClient::load_jsonl(snapshot_path).await?;
        for warning in &warnings {
            tracing::warn!(path = %snapshot_path.display(), "{warning}");
        }

        Ok(Self::with_client(client, config, snapshot_path.to_path_buf()))
    }

    /// Build a context around an already loaded client.
    pub fn with_client(
        client: SnapshotClient,
        config: IssuetreeConfig,
        snapshot_path: PathBuf,
    ) -> Self {
        let issue_count = client.len();
        let cache = IssueCache::with_field_map(config.fields.clone());
        Self {
            tracker: Tracker::new(Arc::new(client), cache),
            config,
            snapshot_path,
            issue_count,
        }
    }

    async fn discover_config(dir: &Path) -> Result<IssuetreeConfig> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if tokio::fs::try_exists(&candidate).await? {
            tracing::debug!(path = %candidate.display(), "Using configuration file");
            IssuetreeConfig::load(&candidate).await
        } else {
            Ok(IssuetreeConfig::default())
        }
    }

    /// The tracker commands run against.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Effective configuration.
    pub fn config(&self) -> &IssuetreeConfig {
        &self.config
    }

    /// Path of the loaded snapshot.
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Number of issues in the snapshot.
    pub fn issue_count(&self) -> usize {
        self.issue_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueKey;
    use crate::tracker::raw_issue;
    use tempfile::TempDir;

    async fn write_snapshot(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("issues.jsonl");
        let lines = [
            raw_issue("A-1").subtask("A-2").build().to_string(),
            "not json".to_string(),
            raw_issue("A-2").build().to_string(),
        ];
        tokio::fs::write(&path, lines.join("\n")).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_open_with_explicit_config() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(&dir).await;
        let config_path = dir.path().join("custom.yaml");
        tokio::fs::write(&config_path, "rollup:\n  stale-after-days: 3\n")
            .await
            .unwrap();

        let app = App::open(&snapshot, Some(&config_path)).await.unwrap();

        assert_eq!(app.issue_count(), 2);
        assert_eq!(app.config().rollup.stale_after_days, 3);
        assert_eq!(app.snapshot_path(), snapshot.as_path());
        let issue = app.tracker().issue(&IssueKey::new("A-1")).await.unwrap();
        assert_eq!(issue.subtask_keys(), &[IssueKey::new("A-2")]);
    }

    #[tokio::test]
    async fn test_discover_config_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let config = App::discover_config(dir.path()).await.unwrap();
        assert_eq!(config, IssuetreeConfig::default());
    }

    #[tokio::test]
    async fn test_discover_config_reads_file() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "rollup:\n  count-new-as-active: false\n",
        )
        .await
        .unwrap();

        let config = App::discover_config(dir.path()).await.unwrap();
        assert!(!config.rollup.count_new_as_active);
    }

    #[tokio::test]
    async fn test_open_missing_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        let result = App::open(&dir.path().join("missing.jsonl"), None).await;
        assert!(result.is_err());
    }
}
