//! Terminal runner for the metro simulation.
//!
//! Loads a JSON configuration (or the built-in metro), runs the trains and
//! redraws the map in the terminal whenever occupancy changes.
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin metro --features json
//! METRO_CONFIG=metro.json METRO_RUN_SECS=30 cargo run --bin metro --features json
//! ```
//!
//! `RUST_LOG` controls log output as usual.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use env_logger::Builder;
use log::{info, warn, LevelFilter};

use rs_metro::{SimulationConfig, SimulationController, StopReason};

const DEFAULT_RUN_SECS: u64 = 20;
const REDRAW_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("rs_metro", LevelFilter::Debug)
        .parse_default_env()
        .init();

    let config = load_config()?;
    let run_for = match std::env::var("METRO_RUN_SECS") {
        Ok(secs) => Duration::from_secs(
            secs.parse()
                .with_context(|| format!("METRO_RUN_SECS is not a number: {secs}"))?,
        ),
        Err(_) => Duration::from_secs(DEFAULT_RUN_SECS),
    };

    let mut sim = SimulationController::new(config).context("failed to set up the simulation")?;
    let monitor = std::sync::Arc::clone(sim.monitor());
    info!(
        "{} train(s) on a {}x{} map, running for {}s",
        sim.number_of_trains(),
        monitor.width(),
        monitor.height(),
        run_for.as_secs()
    );
    println!("{}", monitor.render_ascii());

    sim.start().context("failed to start the trains")?;

    let deadline = Instant::now() + run_for;
    let mut seen = monitor.generation();
    while Instant::now() < deadline {
        let now = monitor.wait_for_change(seen, REDRAW_TIMEOUT);
        if now != seen {
            seen = now;
            println!("generation {seen}\n{}", monitor.render_ascii());
        }
    }

    let report = sim.end().context("failed to end the simulation")?;
    for train in &report.reports {
        match &train.reason {
            StopReason::Faulted(e) => warn!("{}: faulted after {} move(s): {e}", train.train, train.moves),
            reason => info!(
                "{}: {:?} after {} move(s), {} run(s)",
                train.train, reason, train.moves, train.runs
            ),
        }
    }
    for train in &report.panicked {
        warn!("{train}: thread panicked");
    }
    info!("{} tile(s) released at shutdown", report.released_cells);
    Ok(())
}

fn load_config() -> Result<SimulationConfig> {
    let Ok(path) = std::env::var("METRO_CONFIG") else {
        return Ok(SimulationConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    SimulationConfig::from_json(&text).with_context(|| format!("invalid configuration in {path}"))
}
