//! issuetree CLI binary.

use anyhow::Result;
use issuetree::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the issuetree CLI.
///
/// Uses tokio's current_thread runtime; commands are sequential and I/O bound.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Example: RUST_LOG=issuetree=debug issuetree --snapshot issues.jsonl rollup PROJ-1
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("issuetree=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting issuetree CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("issuetree CLI completed successfully");
    Ok(())
}
