//! Scenario Scaler
//!
//! Loads a reference scenario and any number of other scenarios, scales
//! them against the reference and writes a JSON report.
//!
//! Usage: `scenario_scaler [run-config.yaml]`. Without an argument the
//! config path comes from `SCENARIO_SCALER_CONFIG`, then `scaler.yaml`.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use scenario_scaler::config::{RunConfig, CONFIG_ENV_VAR};
use scenario_scaler::loader::{JsonScenarioSource, ScenarioSource};
use scenario_scaler::report::ScalingReport;
use scenario_scaler::Pipeline;

const DEFAULT_CONFIG: &str = "scaler.yaml";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string())
        .into()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging; the report goes to stdout, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scenario_scaler=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let path = config_path();
    let config = RunConfig::load(&path).await?;
    info!("Using run config {:?}", path);

    let pipeline = Pipeline::new(&config.engine);

    let reference = JsonScenarioSource::new(&config.reference, config.ignored_fields.clone())
        .load(pipeline.index())
        .await?;
    pipeline.set_reference(reference)?;

    for scenario_path in &config.scenarios {
        let source = JsonScenarioSource::new(scenario_path, config.ignored_fields.clone());
        match source.load(pipeline.index()).await {
            Ok(scenario) => {
                if let Err(e) = pipeline.add_scenario(scenario) {
                    warn!("Skipping {}: {}", source.describe(), e);
                }
            }
            Err(e) => warn!("Skipping {}: {:#}", source.describe(), e),
        }
    }

    let results = pipeline.run()?;
    let report = ScalingReport::build(&pipeline, &results)?;

    match &config.output {
        Some(out) => {
            report.write(out).await?;
            info!("Report written to {:?}", out);
        }
        None => {
            let json = report.to_json_pretty()?;
            println!("{}", json);
        }
    }

    for (key, summary) in pipeline.summaries() {
        info!(
            "{}: {} ok, {} missing raw, {} missing reference, {} degenerate",
            key, summary.ok, summary.missing_raw, summary.missing_reference, summary.degenerate_reference
        );
    }

    Ok(())
}
