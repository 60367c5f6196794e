//! gator: binary entrypoint.
//! Loads `.env`, sets up tracing and (optionally) the Prometheus exporter,
//! then hands the parsed command to `gator::commands`.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gator::cli::Cli;

/// Compact logs on stderr so they don't mix with command output.
/// `RUST_LOG` overrides the default filter; `GATOR_LOG_JSON=1` switches to
/// JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gator=info,warn"));

    let json = std::env::var("GATOR_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = gator::metrics::init_from_env() {
        tracing::warn!(error = ?e, "metrics exporter not started");
    }

    gator::commands::run(cli).await
}
