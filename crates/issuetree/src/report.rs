//! Status report for one parent issue and each of its direct children.
//!
//! For every direct child the report carries a roll-up of the child's own
//! descendants plus its contributors, and for the parent an overall roll-up
//! across everything below it. Children that are no longer active are left
//! out unless asked for.

use crate::domain::{IssueKey, IssueRecord};
use crate::error::Result;
use crate::issue::Tracker;
use crate::rollup::{self, RollupPolicy, RollupReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// One issue's line in a report, with its contributors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Issue key
    pub key: IssueKey,

    /// One-line summary
    pub summary: String,

    /// Workflow status name
    pub status: String,

    /// Roll-up of the issue's descendants
    pub rollup: RollupReport,

    /// Contributors on active issues at or below this one
    pub active_contributors: BTreeSet<String>,

    /// Contributors on every issue at or below this one
    pub contributors: BTreeSet<String>,
}

/// Report for a parent issue and its direct children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// The parent issue
    pub root: ReportEntry,

    /// Direct children, sorted by key
    pub children: Vec<ReportEntry>,

    /// Direct children left out because they were inactive
    pub skipped: Vec<IssueKey>,
}

/// Build a report for `root` as of `now`.
///
/// With `include_inactive` unset, direct children that are done or stale
/// are listed in [`StatusReport::skipped`] instead of being reported.
///
/// # Errors
///
/// Fails if `root` or one of its direct children cannot be fetched, or with
/// any error from the roll-ups.
pub async fn build_report_at(
    tracker: &Tracker,
    root: &IssueKey,
    policy: &RollupPolicy,
    include_inactive: bool,
    now: DateTime<Utc>,
) -> Result<StatusReport> {
    let parent = tracker.issue(root).await?;

    let mut kids = parent.children().await?;
    kids.sort_by(|a, b| a.key().cmp(b.key()));

    let mut children = Vec::with_capacity(kids.len());
    let mut skipped = Vec::new();
    for child in &kids {
        if !include_inactive
            && !rollup::is_active_at(child.record(), now, policy.stale_after_days, true)
        {
            tracing::info!(key = %child.key(), "Skipping inactive issue");
            skipped.push(child.key().clone());
            continue;
        }
        children.push(entry(tracker, child.record(), policy, now).await?);
    }

    Ok(StatusReport {
        root: entry(tracker, parent.record(), policy, now).await?,
        children,
        skipped,
    })
}

/// Build a report for `root` against the current time.
///
/// # Errors
///
/// See [`build_report_at`].
pub async fn build_report(
    tracker: &Tracker,
    root: &IssueKey,
    policy: &RollupPolicy,
    include_inactive: bool,
) -> Result<StatusReport> {
    build_report_at(tracker, root, policy, include_inactive, Utc::now()).await
}

async fn entry(
    tracker: &Tracker,
    record: &IssueRecord,
    policy: &RollupPolicy,
    now: DateTime<Utc>,
) -> Result<ReportEntry> {
    let key = &record.key;
    Ok(ReportEntry {
        key: key.clone(),
        summary: record.summary.clone(),
        status: record.status.clone(),
        rollup: rollup::rollup_at(tracker, key, policy, now).await?,
        active_contributors: rollup::rollup_contributors_at(
            tracker,
            key,
            Some(policy.stale_after_days),
            now,
        )
        .await?,
        contributors: rollup::rollup_contributors_at(tracker, key, None, now).await?,
    })
}
