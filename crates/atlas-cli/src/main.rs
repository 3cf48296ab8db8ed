//! atlas -- collect source maps across one instrumented page load.
//!
//! Connects to a running Chrome page target, opens a collection window,
//! navigates, waits for the load event, and prints the ordered result list
//! as JSON for downstream analysis.

use std::sync::Arc;
use std::time::Duration;

use atlas_browser::{BrowserDriver, CdpClient};
use atlas_sourcemaps::SourceMapCollector;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Collect script source maps across one instrumented page load.
#[derive(Parser, Debug)]
#[command(name = "atlas", version, about)]
struct Cli {
    /// DevTools WebSocket URL of the page target
    /// (ws://localhost:9222/devtools/page/<id>, listed at http://localhost:9222/json)
    #[arg(long)]
    ws_url: String,

    /// URL to navigate to for the instrumented page load
    url: String,

    /// Seconds to wait for the page load event
    #[arg(long, default_value_t = 30)]
    load_timeout: u64,

    /// Timeout in seconds for individual CDP commands, including in-page
    /// source map fetches
    #[arg(long, default_value_t = 30)]
    command_timeout: u64,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with env filter (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let client = CdpClient::connect(&cli.ws_url)
        .await?
        .with_command_timeout(Duration::from_secs(cli.command_timeout));
    let mut driver = BrowserDriver::from_client(Arc::new(client)).await?;
    let mut collector = SourceMapCollector::new(driver.client());

    // The window must open before navigation: scriptParsed events fired
    // earlier are lost, not queued.
    collector.start().await?;
    driver.navigate(&cli.url).await?;
    driver
        .wait_for_load(Duration::from_secs(cli.load_timeout))
        .await?;
    let results = collector.stop().await?;

    tracing::info!(scripts = results.len(), "collection complete");

    let output = if cli.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{output}");

    Ok(())
}
