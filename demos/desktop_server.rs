//! Desktop server for driving the metro simulation over HTTP.
//!
//! Builds the default metro, serves the API on port 8080 and logs every
//! occupancy change. The trains stay parked until `POST /api/start`.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example desktop_server --features web
//! curl -X POST http://localhost:8080/api/start
//! curl http://localhost:8080/api/map
//! curl -X POST http://localhost:8080/api/end
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, LevelFilter};

use rs_metro::services::{run_server_with_state, SharedSimulation, WebServerConfig};
use rs_metro::{SimulationConfig, SimulationController};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let controller = SimulationController::new(SimulationConfig::default())
        .context("failed to set up the default metro")?;
    let state = Arc::new(SharedSimulation::new(controller));
    let web_config = WebServerConfig::default();

    info!("API: http://{}/api/map", web_config.addr);
    info!("POST /api/start, /api/pause, /api/restart, /api/end to drive the trains");

    spawn_change_logger(Arc::clone(&state));

    run_server_with_state(state, web_config)
        .await
        .context("web server failed")
}

/// Log the occupancy whenever it changes.
fn spawn_change_logger(state: Arc<SharedSimulation>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            if let Some(map) = state.check_changes() {
                debug!("generation {}:\n{}", map.generation, map.rows.join("\n"));
            }
        }
    });
}
