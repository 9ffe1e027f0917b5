use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use antforage::config::SimulationConfig;
use antforage::simulation::{FixedStepClock, Interval, Simulation};
use clap::Parser;
use shared::Clock;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the headless foraging run.
#[derive(Parser)]
#[command(name = "antforage", version, about = "Ant colony foraging simulation")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run.
    #[arg(short, long, default_value_t = 6000)]
    ticks: u64,

    /// Seconds simulated per tick.
    #[arg(long, default_value_t = 0.02)]
    dt: f32,

    /// Overrides the seed from the configuration file.
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated seconds between stats lines.
    #[arg(long, default_value_t = 5.0)]
    report_every: f32,
}

/// Loads the simulation configuration from a TOML file or uses defaults.
fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let Some(path) = path else {
        info!("No config file provided, using defaults");
        return Ok(SimulationConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = SimulationConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

fn log_stats(sim: &Simulation) {
    let stats = sim.stats();
    info!(
        tick = stats.tick,
        elapsed = %format!("{:.1}s", stats.elapsed),
        ants = stats.ants,
        searching = stats.searching,
        turning = stats.turning,
        going_home = stats.going_home,
        to_colony = stats.to_colony_markers,
        to_food = stats.to_food_markers,
        food_left = stats.food_left,
        collected = stats.food_collected,
        best_quality = stats.best_path_quality,
        "Stats"
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        cli.dt.is_finite() && cli.dt > 0.0,
        "--dt must be a positive number of seconds"
    );

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let mut sim = Simulation::new(config).context("Invalid simulation configuration")?;
    sim.populate();

    let mut clock = FixedStepClock::new(cli.dt);
    let mut report = Interval::new(cli.report_every);
    for _ in 0..cli.ticks {
        let time = clock.tick();
        sim.tick(time);
        if report.update(time.delta) {
            log_stats(&sim);
        }
    }

    log_stats(&sim);
    info!(
        markers = sim.marker_views().len(),
        ants = sim.ant_views().len(),
        "Run finished"
    );
    Ok(())
}
