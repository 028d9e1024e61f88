use std::path::PathBuf;

use anyhow::{Context as AnyhowContext, Result};
use frametree::scenario::Scenario;
use frametree::FrameTreeConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let scenario_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: frametree <scenario.yaml>")?;

    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let config = FrameTreeConfig::from_env().unwrap_or_else(|err| {
        eprintln!("Failed to load frame tree configuration: {err}. Using defaults.");
        FrameTreeConfig::default()
    });

    let scenario = Scenario::load(&scenario_path)
        .with_context(|| format!("failed to load scenario {}", scenario_path.display()))?;
    tracing::info!(
        path = %scenario_path.display(),
        steps = scenario.steps.len(),
        "replaying scenario"
    );

    let report = scenario.run(config).context("scenario replay failed")?;
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}
