//! # rs-metro
//!
//! A concurrent metro tunnel simulation. Every train runs on its own
//! thread and moves through a shared tile map guarded by one monitor.
//!
//! ## Features
//!
//! - **Monitor-guarded map**: a train's window of tiles moves atomically; no
//!   tile is ever held by two trains
//! - **Station gates**: entrances around a station are claimed through
//!   per-entrance gates, so at most one train waits on a given platform side
//! - **Blocking or polling trains**: a train either sleeps until its next
//!   tile frees up or backs off and retries, optionally turning around
//! - **Lifecycle control**: start, pause, restart and end, with a clean join
//!   and an empty map after end
//! - **Route planning**: shortest routes over the tunnel grid, with waypoints
//!
//! ## Architecture
//!
//! - `coordinates`, `field`, `grid` - The tile map and its labels
//! - `gate` - Station entrance gates
//! - `monitor` - The track monitor: occupancy, movement, painting
//! - `route` - Routes and the route planner
//! - `config` - Simulation configuration
//! - `train` - Train units and their controls
//! - `simulation` - The lifecycle controller
//! - `services` - HTTP API (`web` feature)
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use rs_metro::{
//!     Coordinates, LayoutConfig, SimulationConfig, SimulationController, TrainConfig, TrainId,
//! };
//!
//! let config = SimulationConfig::empty()
//!     .with_layout(LayoutConfig::rows(&["........", ".##..##.", "........"]))
//!     .with_train_length(2)
//!     .with_step_delay_ms(1)
//!     .with_train(
//!         TrainConfig::new(TrainId(1), "east")
//!             .with_endpoints(Coordinates::new(0, 0), Coordinates::new(2, 7)),
//!     );
//!
//! let mut sim = SimulationController::new(config)?;
//! sim.start()?;
//! std::thread::sleep(Duration::from_millis(50));
//! let report = sim.end()?;
//! assert_eq!(report.reports.len(), 1);
//! assert!(sim.monitor().occupied_cells().is_empty());
//! # Ok::<(), rs_metro::SimulationError>(())
//! ```

#![warn(missing_docs)]

/// Configuration of layouts, trains and movement policy.
pub mod config;
/// Tile coordinates.
pub mod coordinates;
/// Error types.
pub mod error;
/// Tile labels and train identities.
pub mod field;
/// Station entrance gates.
pub mod gate;
/// The labelled tunnel map.
pub mod grid;
/// The track monitor.
pub mod monitor;
/// Routes and route planning.
pub mod route;
/// Simulation lifecycle controller.
pub mod simulation;
/// Train units.
pub mod train;

/// Network services (HTTP API).
#[cfg(feature = "web")]
pub mod services;

pub use config::{
    short_string, AdvanceMode, BackoffConfig, LayoutConfig, ShortString, SimulationConfig,
    TrainConfig, TrainPlan,
};
pub use coordinates::Coordinates;
pub use error::{ConfigError, MonitorError, SimulationError};
pub use field::{FieldType, TrainId};
pub use gate::{GateBook, StationGates};
pub use grid::{TunnelsGrid, METRO_HEIGHT, METRO_WIDTH};
pub use monitor::{Advance, Painter, ServiceGuard, TrackMonitor};
pub use route::{plan_route, Route, RouteMode};
pub use simulation::{Phase, ShutdownReport, SimulationController, EVENT_QUEUE_CAPACITY};
pub use train::{
    StopReason, TrainControl, TrainEvent, TrainReport, TrainState, TrainStatus, TrainUnit,
    UnitSettings,
};
