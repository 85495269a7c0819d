//! Drowsiness Monitor - Main Entry Point
//!
//! Usage: drowsiness-monitor <trace.jsonl> [settings.toml]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use monitor::{init_logging, install_metrics, load_settings, load_trace, run_replay};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(trace_path) = args.next().map(PathBuf::from) else {
        bail!("usage: drowsiness-monitor <trace.jsonl> [settings.toml]");
    };
    let settings_path = args.next().map(PathBuf::from);

    let settings = load_settings(settings_path.as_deref()).context("Failed to load settings")?;
    init_logging(&settings.log_level, settings.log_json).context("Failed to initialize logging")?;

    let metrics = install_metrics().context("Failed to install metrics recorder")?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let frames = load_trace(&trace_path)
        .with_context(|| format!("Failed to read trace {}", trace_path.display()))?;
    info!("Loaded {} frames from {}", frames.len(), trace_path.display());

    let summary = run_replay(&settings, frames).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if settings.print_metrics {
        print!("{}", metrics.render());
    }

    Ok(())
}
