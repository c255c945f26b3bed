use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

use tracker_loss_pipeline::config::PlantsConfig;
use tracker_loss_pipeline::pipeline::{PlantPipeline, Stage};

#[derive(Parser, Debug)]
#[command(name = "tracker_loss_pipeline")]
#[command(about = "Derives stalled-tracker generation losses from photovoltaic plant telemetry", long_about = None)]
struct Args {
    /// Plant configuration file
    #[arg(long, env = "PLANTS_CONFIG", default_value = "resources/solar_plants.json")]
    config: PathBuf,

    /// Process a single plant instead of every configured one
    #[arg(long)]
    plant: Option<String>,

    /// Pipeline stage to run
    #[arg(long, value_enum, default_value = "all")]
    stage: Stage,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracker_loss_pipeline=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = PlantsConfig::load(&args.config)?;

    let plants: Vec<(&str, _)> = match &args.plant {
        Some(name) => vec![(name.as_str(), config.plant(name)?)],
        None => config
            .plants
            .iter()
            .map(|(name, plant)| (name.as_str(), plant))
            .collect(),
    };

    let total_start = Instant::now();
    let mut failures = 0usize;
    for (name, plant_config) in plants {
        info!(plant = name, "processing plant");
        let pipeline = PlantPipeline::new(name, plant_config);
        // One plant aborting must not take the others down with it.
        if let Err(e) = pipeline.run_stage(args.stage) {
            error!(plant = name, "plant run aborted: {e}");
            failures += 1;
        }
    }

    info!(
        "batch finished in {:.2}s ({} failure(s))",
        total_start.elapsed().as_secs_f32(),
        failures
    );
    if failures > 0 {
        anyhow::bail!("{failures} plant run(s) failed");
    }
    Ok(())
}
