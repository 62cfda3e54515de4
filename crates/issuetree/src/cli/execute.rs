//! Command execution logic.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::io::{self, Write};

use super::args::{AncestorsArgs, CheckArgs, DescendantsArgs, RollupArgs};
use crate::app::App;
use crate::domain::IssueKey;
use crate::output::{self, CheckSummary, OutputConfig, OutputMode, TreeNode};
use crate::report;
use crate::traversal::{self, hierarchy::HierarchyGraph};

/// Execute the rollup command
pub async fn execute_rollup(app: &App, args: &RollupArgs, output_mode: OutputMode) -> Result<()> {
    let key = IssueKey::new(args.key.as_str());
    let mut policy = app.config().rollup;
    if let Some(days) = args.stale_after_days {
        policy.stale_after_days = days;
    }

    let report = report::build_report(app.tracker(), &key, &policy, args.include_inactive).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&report)?,
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            output::write_report(&mut handle, &report, &OutputConfig::from_env())?;
        }
    }

    log_cache_stats(app).await;
    Ok(())
}

/// Execute the descendants command
pub async fn execute_descendants(
    app: &App,
    args: &DescendantsArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let key = IssueKey::new(args.key.as_str());
    let steps = traversal::walk(app.tracker(), &key, args.depth).await?;

    if output_mode == OutputMode::Json {
        output::print_json(&steps[1..])?;
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.flat {
        let mut keys: Vec<&IssueKey> = steps[1..].iter().map(|step| &step.key).collect();
        keys.sort();
        for key in keys {
            writeln!(handle, "{key}")?;
        }
    } else {
        let mut records = HashMap::with_capacity(steps.len());
        for step in &steps {
            if let Some(record) = app.tracker().cache().peek(&step.key).await {
                records.insert(step.key.clone(), record);
            }
        }
        if let Some(tree) = TreeNode::from_walk(&steps, &records) {
            output::write_tree(&mut handle, &tree, &OutputConfig::from_env())?;
        }
    }

    log_cache_stats(app).await;
    Ok(())
}

/// Execute the ancestors command
pub async fn execute_ancestors(
    app: &App,
    args: &AncestorsArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let key = IssueKey::new(args.key.as_str());
    let chain = traversal::ancestors(app.tracker(), &key).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "key": key,
            "level": chain.len(),
            "ancestors": chain,
        }))?,
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            output::write_ancestors(&mut handle, &key, &chain, &OutputConfig::from_env())?;
        }
    }
    Ok(())
}

/// Execute the check command
///
/// Fails after printing when the hierarchy has problems, so scripts can
/// use the exit status.
pub async fn execute_check(app: &App, args: &CheckArgs, output_mode: OutputMode) -> Result<()> {
    let key = IssueKey::new(args.key.as_str());
    let graph = HierarchyGraph::build(app.tracker(), &key).await?;
    let summary = CheckSummary {
        issues: graph.node_count(),
        cycles: graph.cycles(),
        shared_children: graph.shared_children(),
        dangling: graph.dangling().to_vec(),
    };

    match output_mode {
        OutputMode::Json => output::print_json(&summary)?,
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            output::write_check(&mut handle, &key, &summary, &OutputConfig::from_env())?;
        }
    }

    if !summary.is_clean() {
        let problems = summary.cycles.len() + summary.shared_children.len() + summary.dangling.len();
        bail!("hierarchy under {key} has {problems} problem(s)");
    }
    Ok(())
}

async fn log_cache_stats(app: &App) {
    tracing::debug!(stats = %app.tracker().cache().stats().await, "Issue cache");
}
