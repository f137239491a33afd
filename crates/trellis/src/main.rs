//! Trellis CLI binary.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use trellis::cli::Cli;

/// Main entry point for the trellis CLI.
///
/// Uses tokio's current_thread runtime; every command is a short sequence
/// of file and git operations.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG, e.g. RUST_LOG=trellis=debug,trellis_record=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trellis=info,trellis_record=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Starting trellis CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Trellis CLI completed successfully");
    Ok(())
}
