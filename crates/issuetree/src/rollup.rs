//! Status roll-up engine.
//!
//! Buckets a set of issues into [`RollupStatus`] categories and reduces the
//! buckets to one verdict for the parent that owns them.
//!
//! # Classification
//!
//! Rules are applied in order and the first match wins:
//!
//! 1. status category `Done` gives [`RollupStatus::Done`]
//! 2. an inward "is blocked by" link to an issue that is not `Done` gives
//!    [`RollupStatus::Blocked`]
//! 3. no update for more than `stale_after_days` gives [`RollupStatus::Stale`]
//! 4. status category `New` gives [`RollupStatus::NotStarted`]
//! 5. everything else is [`RollupStatus::OnTrack`]
//!
//! A blocker's status is read from the link when the tracker embedded it,
//! otherwise it is looked up through the cache.
//!
//! # Aggregation
//!
//! The verdict is the most severe bucket present:
//! `Blocked > Stale > NotStarted > OnTrack > Done`.

use crate::domain::{IssueKey, IssueRecord, StatusCategory};
use crate::error::Result;
use crate::issue::{Issue, Tracker};
use crate::traversal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Default number of days without an update before an issue is stale.
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 14;

/// Roll-up category of one issue, or the verdict for a group of issues.
///
/// Variants are declared in ascending severity, so `Ord` ranks them and
/// the verdict for a group is simply the maximum present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupStatus {
    /// Work is complete
    Done,

    /// Work is progressing normally
    OnTrack,

    /// Work has not started
    NotStarted,

    /// No update within the staleness window
    Stale,

    /// Waiting on an unresolved blocker
    Blocked,
}

impl RollupStatus {
    /// All statuses in ascending severity.
    pub const ALL: [Self; 5] = [
        Self::Done,
        Self::OnTrack,
        Self::NotStarted,
        Self::Stale,
        Self::Blocked,
    ];

    /// Label used in rendered reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Done => "Done",
            Self::OnTrack => "OnTrack",
            Self::NotStarted => "NotStarted",
            Self::Stale => "Stale",
            Self::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for RollupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Issues grouped by roll-up category. Only non-empty buckets are present.
pub type Categorized = BTreeMap<RollupStatus, BTreeSet<IssueKey>>;

/// Thresholds that drive classification and the activity predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RollupPolicy {
    /// Days without an update before an open issue counts as stale
    pub stale_after_days: i64,

    /// Whether issues that have not started still count as active
    pub count_new_as_active: bool,
}

impl Default for RollupPolicy {
    fn default() -> Self {
        Self {
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            count_new_as_active: true,
        }
    }
}

/// Returns `true` if `record` has gone more than `stale_after_days` without
/// an update as of `now`.
///
/// A threshold too large to represent as a duration never expires.
pub fn is_stale_at(record: &IssueRecord, stale_after_days: i64, now: DateTime<Utc>) -> bool {
    Duration::try_days(stale_after_days).is_some_and(|window| now - record.updated > window)
}

/// Activity predicate evaluated against the current time.
///
/// See [`is_active_at`].
pub fn is_active(record: &IssueRecord, stale_after_days: i64, count_new_as_active: bool) -> bool {
    is_active_at(record, Utc::now(), stale_after_days, count_new_as_active)
}

/// Returns `true` if the issue is open, was updated within the staleness
/// window, and, unless `count_new_as_active` is set, has started.
pub fn is_active_at(
    record: &IssueRecord,
    now: DateTime<Utc>,
    stale_after_days: i64,
    count_new_as_active: bool,
) -> bool {
    if record.is_done() || is_stale_at(record, stale_after_days, now) {
        return false;
    }
    count_new_as_active || record.status_category != StatusCategory::New
}

/// Classify one issue as of `now`.
///
/// # Errors
///
/// Propagates cache errors from looking up a blocker whose status was not
/// embedded in the link, including `Error::NotFound` for a dangling blocker.
pub async fn classify_at(
    tracker: &Tracker,
    record: &IssueRecord,
    stale_after_days: i64,
    now: DateTime<Utc>,
) -> Result<RollupStatus> {
    if record.is_done() {
        return Ok(RollupStatus::Done);
    }
    if has_open_blocker(tracker, record).await? {
        return Ok(RollupStatus::Blocked);
    }
    if is_stale_at(record, stale_after_days, now) {
        return Ok(RollupStatus::Stale);
    }
    if record.status_category == StatusCategory::New {
        return Ok(RollupStatus::NotStarted);
    }
    Ok(RollupStatus::OnTrack)
}

async fn has_open_blocker(tracker: &Tracker, record: &IssueRecord) -> Result<bool> {
    for link in record.blocking_links() {
        let blocker_done = match link.target_status {
            Some(category) => category == StatusCategory::Done,
            None => tracker.record(&link.target).await?.is_done(),
        };
        if !blocker_done {
            tracing::debug!(key = %record.key, blocker = %link.target, "Issue is blocked");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Bucket `issues` by roll-up category against the current time.
///
/// # Errors
///
/// See [`classify_at`].
pub async fn categorize_issues(
    tracker: &Tracker,
    issues: &[Issue],
    stale_after_days: i64,
) -> Result<Categorized> {
    categorize_issues_at(tracker, issues, stale_after_days, Utc::now()).await
}

/// Bucket `issues` by roll-up category as of `now`.
///
/// Every input issue lands in exactly one bucket.
///
/// # Errors
///
/// See [`classify_at`].
pub async fn categorize_issues_at(
    tracker: &Tracker,
    issues: &[Issue],
    stale_after_days: i64,
    now: DateTime<Utc>,
) -> Result<Categorized> {
    let mut categorized = Categorized::new();
    for issue in issues {
        let status = classify_at(tracker, issue.record(), stale_after_days, now).await?;
        categorized
            .entry(status)
            .or_default()
            .insert(issue.key().clone());
    }
    Ok(categorized)
}

/// Most severe non-empty bucket, or `None` when nothing was categorized.
pub fn rollup_status(categorized: &Categorized) -> Option<RollupStatus> {
    categorized
        .iter()
        .filter(|(_, keys)| !keys.is_empty())
        .map(|(status, _)| *status)
        .max()
}

/// Roll-up of every descendant of one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupReport {
    /// The issue whose descendants were rolled up
    pub root: IssueKey,

    /// Descendant keys per bucket
    pub categorized: Categorized,

    /// Number of descendants rolled up
    pub total: usize,

    /// Most severe bucket, `None` when the root has no descendants
    pub verdict: Option<RollupStatus>,
}

impl RollupReport {
    /// Number of descendants in `status`.
    pub fn count(&self, status: RollupStatus) -> usize {
        self.categorized.get(&status).map_or(0, BTreeSet::len)
    }

    /// Non-zero bucket counts in ascending severity.
    pub fn counts(&self) -> Vec<(RollupStatus, usize)> {
        RollupStatus::ALL
            .into_iter()
            .map(|status| (status, self.count(status)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

impl fmt::Display for RollupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts();
        if counts.is_empty() {
            return write!(f, "Sub-issues: none - Total {}", self.total);
        }
        let rendered: Vec<String> = counts
            .iter()
            .map(|(status, count)| format!("{count}({status})"))
            .collect();
        write!(f, "Sub-issues: {} - Total {}", rendered.join(", "), self.total)
    }
}

/// Roll up every descendant of `root` against the current time.
///
/// # Errors
///
/// See [`rollup_at`].
pub async fn rollup(tracker: &Tracker, root: &IssueKey, policy: &RollupPolicy) -> Result<RollupReport> {
    rollup_at(tracker, root, policy, Utc::now()).await
}

/// Roll up every descendant of `root` as of `now`.
///
/// Descendants that no longer exist are skipped by the traversal and do not
/// count toward the total.
///
/// # Errors
///
/// Fails if `root` cannot be fetched, or with any non-`NotFound` error from
/// the traversal or classification.
pub async fn rollup_at(
    tracker: &Tracker,
    root: &IssueKey,
    policy: &RollupPolicy,
    now: DateTime<Utc>,
) -> Result<RollupReport> {
    let keys = sorted(traversal::descendants(tracker, root).await?);

    let mut issues = Vec::with_capacity(keys.len());
    for key in &keys {
        issues.push(tracker.issue(key).await?);
    }

    let categorized = categorize_issues_at(tracker, &issues, policy.stale_after_days, now).await?;
    let verdict = rollup_status(&categorized);
    let report = RollupReport {
        root: root.clone(),
        categorized,
        total: issues.len(),
        verdict,
    };

    tracing::info!(
        key = %root,
        total = report.total,
        verdict = ?report.verdict,
        "Rolled up descendants"
    );
    Ok(report)
}

/// Contributors across `root` and all of its descendants.
///
/// With `active_within` set, only issues active under that staleness window
/// contribute; issues that have not started still count as active.
///
/// # Errors
///
/// Fails if `root` cannot be fetched, or with any non-`NotFound` error from
/// the traversal.
pub async fn rollup_contributors(
    tracker: &Tracker,
    root: &IssueKey,
    active_within: Option<i64>,
) -> Result<BTreeSet<String>> {
    rollup_contributors_at(tracker, root, active_within, Utc::now()).await
}

/// [`rollup_contributors`] evaluated as of `now`.
///
/// # Errors
///
/// See [`rollup_contributors`].
pub async fn rollup_contributors_at(
    tracker: &Tracker,
    root: &IssueKey,
    active_within: Option<i64>,
    now: DateTime<Utc>,
) -> Result<BTreeSet<String>> {
    let mut keys = vec![root.clone()];
    keys.extend(sorted(traversal::descendants(tracker, root).await?));

    let mut contributors = BTreeSet::new();
    for key in &keys {
        let record = tracker.record(key).await?;
        let counts = active_within.is_none_or(|days| is_active_at(&record, now, days, true));
        if counts {
            contributors.extend(record.contributors());
        }
    }
    Ok(contributors)
}

fn sorted(keys: impl IntoIterator<Item = IssueKey>) -> Vec<IssueKey> {
    let mut keys: Vec<IssueKey> = keys.into_iter().collect();
    keys.sort();
    keys
}
