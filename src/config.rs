//! Simulation configuration.
//!
//! A [`SimulationConfig`] is a plain value handed once to
//! [`SimulationController::new`](crate::SimulationController::new). It
//! describes the map, the trains and their routes, and the pacing of the
//! run. Train names use `heapless::String` so configs stay small and
//! `Clone` is cheap.
//!
//! # Example
//!
//! ```rust
//! use rs_metro::config::{AdvanceMode, BackoffConfig, LayoutConfig, SimulationConfig, TrainConfig};
//! use rs_metro::{Coordinates, TrainId};
//!
//! // The default is the three-train metro
//! let config = SimulationConfig::default();
//! assert_eq!(config.trains.len(), 3);
//!
//! // Or a custom layout
//! let config = SimulationConfig::empty()
//!     .with_layout(LayoutConfig::rows(&[".....", "....."]))
//!     .with_train(
//!         TrainConfig::new(TrainId(1), "north")
//!             .with_endpoints(Coordinates::new(0, 0), Coordinates::new(0, 4)),
//!     )
//!     .with_train_length(2)
//!     .with_advance_mode(AdvanceMode::Polling(BackoffConfig::default()));
//! assert!(config.validate().is_ok());
//! ```

use heapless::String as HString;

use crate::coordinates::Coordinates;
use crate::error::ConfigError;
use crate::field::TrainId;
use crate::grid::TunnelsGrid;
use crate::route::{Route, RouteMode};

/// Maximum length for short config strings (train names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    for c in s.chars() {
        if hs.push(c).is_err() {
            break;
        }
    }
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete simulation configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    /// Base map layout
    pub layout: LayoutConfig,
    /// Extra station tiles painted on top of the layout
    pub stations: Vec<Coordinates>,
    /// Explicit station entrances (derived from stations when `None`)
    pub entrances: Option<Vec<Coordinates>>,
    /// Trains in declaration order
    pub trains: Vec<TrainConfig>,
    /// Declared train count; must match `trains` when present
    pub number_of_trains: Option<usize>,
    /// Wagons per train unless a train overrides it
    pub train_length: usize,
    /// Launch order (declaration order when empty)
    pub start_order: Vec<TrainId>,
    /// Delay between launching consecutive trains
    pub start_stagger_ms: u64,
    /// Pause after every committed advance
    pub step_delay_ms: u64,
    /// How trains ask the monitor to advance
    pub advance_mode: AdvanceMode,
    /// Paint each route with its train's path label during setup
    pub paint_routes: bool,
}

impl Default for SimulationConfig {
    /// The metro of the original application: the 11×17 map with corner
    /// stations and three shuttling trains of three wagons.
    fn default() -> Self {
        let c = Coordinates::new;
        let trains = [
            (1, "T1", c(0, 1), c(16, 9)),
            (2, "T2", c(16, 1), c(1, 0)),
            (3, "T3", c(15, 10), c(0, 1)),
        ]
        .into_iter()
        .map(|(id, name, from, to)| {
            TrainConfig::new(TrainId(id), name)
                .with_endpoints(from, to)
                .with_mode(RouteMode::Shuttle)
        })
        .collect();

        Self {
            trains,
            step_delay_ms: 200,
            advance_mode: AdvanceMode::Polling(BackoffConfig::default().with_reverse_after(Some(10))),
            ..Self::empty()
        }
    }
}

impl SimulationConfig {
    /// The metro layout with no trains and no pacing delay.
    pub fn empty() -> Self {
        Self {
            layout: LayoutConfig::Metro,
            stations: Vec::new(),
            entrances: None,
            trains: Vec::new(),
            number_of_trains: None,
            train_length: 3,
            start_order: Vec::new(),
            start_stagger_ms: 0,
            step_delay_ms: 0,
            advance_mode: AdvanceMode::Blocking,
            paint_routes: true,
        }
    }

    /// Set the layout
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Add a station tile
    pub fn with_station(mut self, at: Coordinates) -> Self {
        self.stations.push(at);
        self
    }

    /// Replace the derived entrances with an explicit list
    pub fn with_entrances(mut self, entrances: Vec<Coordinates>) -> Self {
        self.entrances = Some(entrances);
        self
    }

    /// Add a train
    pub fn with_train(mut self, train: TrainConfig) -> Self {
        self.trains.push(train);
        self
    }

    /// Declare the expected number of trains
    pub fn with_number_of_trains(mut self, n: usize) -> Self {
        self.number_of_trains = Some(n);
        self
    }

    /// Set the default wagon count
    pub fn with_train_length(mut self, wagons: usize) -> Self {
        self.train_length = wagons;
        self
    }

    /// Set the launch order
    pub fn with_start_order(mut self, order: Vec<TrainId>) -> Self {
        self.start_order = order;
        self
    }

    /// Set the delay between launches
    pub fn with_start_stagger_ms(mut self, ms: u64) -> Self {
        self.start_stagger_ms = ms;
        self
    }

    /// Set the delay after each advance
    pub fn with_step_delay_ms(mut self, ms: u64) -> Self {
        self.step_delay_ms = ms;
        self
    }

    /// Set the advance mode
    pub fn with_advance_mode(mut self, mode: AdvanceMode) -> Self {
        self.advance_mode = mode;
        self
    }

    /// Enable or disable route painting
    pub fn with_paint_routes(mut self, paint: bool) -> Self {
        self.paint_routes = paint;
        self
    }

    /// Build the labelled grid: layout, extra stations, then entrances.
    pub fn build_grid(&self) -> Result<TunnelsGrid, ConfigError> {
        let mut grid = match &self.layout {
            LayoutConfig::Metro => TunnelsGrid::metro(),
            LayoutConfig::Rows { rows } => TunnelsGrid::from_rows(rows.as_slice())?,
        };
        for &at in &self.stations {
            grid.add_station(at)?;
        }
        if let Some(entrances) = &self.entrances {
            grid.set_entrances(entrances.clone())?;
        }
        Ok(grid)
    }

    /// Resolve every train against `grid`, in launch order.
    pub fn plan_trains(&self, grid: &TunnelsGrid) -> Result<Vec<TrainPlan>, ConfigError> {
        if let Some(declared) = self.number_of_trains {
            if declared != self.trains.len() {
                return Err(ConfigError::TrainCount {
                    declared,
                    listed: self.trains.len(),
                });
            }
        }
        for (i, t) in self.trains.iter().enumerate() {
            if self.trains[..i].iter().any(|o| o.id == t.id) {
                return Err(ConfigError::DuplicateTrain { train: t.id });
            }
        }
        if let AdvanceMode::Polling(backoff) = &self.advance_mode {
            backoff.validate()?;
        }

        self.launch_order()?
            .into_iter()
            .filter_map(|id| self.trains.iter().find(|t| t.id == id))
            .map(|t| t.plan(grid, self.train_length))
            .collect()
    }

    /// Check the whole configuration without starting anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = self.build_grid()?;
        self.plan_trains(&grid).map(|_| ())
    }

    /// Train ids in launch order.
    pub fn launch_order(&self) -> Result<Vec<TrainId>, ConfigError> {
        if self.start_order.is_empty() {
            return Ok(self.trains.iter().map(|t| t.id).collect());
        }
        for (i, &id) in self.start_order.iter().enumerate() {
            let known = self.trains.iter().any(|t| t.id == id);
            if !known || self.start_order[..i].contains(&id) {
                return Err(ConfigError::BadStartOrder { train: id });
            }
        }
        if let Some(missing) = self
            .trains
            .iter()
            .find(|t| !self.start_order.contains(&t.id))
        {
            return Err(ConfigError::BadStartOrder { train: missing.id });
        }
        Ok(self.start_order.clone())
    }

    /// Parse a configuration from JSON. Missing fields take the values of
    /// [`SimulationConfig::default`].
    #[cfg(feature = "json")]
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize the configuration as pretty-printed JSON.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// ============================================================================
// Layout Config
// ============================================================================

/// Base map layout
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum LayoutConfig {
    /// The built-in 11×17 metro map
    #[default]
    Metro,
    /// Rows of `.` (tunnel), `#` (wall) and `S` (station)
    Rows {
        /// One string per map row
        rows: Vec<String>,
    },
}

impl LayoutConfig {
    /// Layout from string rows
    pub fn rows<S: AsRef<str>>(rows: &[S]) -> Self {
        LayoutConfig::Rows {
            rows: rows.iter().map(|r| r.as_ref().to_owned()).collect(),
        }
    }
}

// ============================================================================
// Advance Mode
// ============================================================================

/// How a train asks the monitor for its next tiles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum AdvanceMode {
    /// Sleep inside the monitor until the tiles free up
    #[default]
    Blocking,
    /// Ask without waiting and retry after a growing delay
    Polling(BackoffConfig),
}

/// Retry policy for [`AdvanceMode::Polling`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffConfig {
    /// First retry delay in milliseconds
    pub initial_ms: u64,
    /// Upper bound for the retry delay
    pub max_ms: u64,
    /// Multiplier applied after each failed attempt
    pub factor: u32,
    /// Turn a shuttle train around after this many failed attempts in a
    /// row. `None` keeps retrying forever.
    pub reverse_after: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 5,
            max_ms: 200,
            factor: 2,
            reverse_after: None,
        }
    }
}

impl BackoffConfig {
    /// Set the first retry delay
    pub fn with_initial_ms(mut self, ms: u64) -> Self {
        self.initial_ms = ms;
        self
    }

    /// Set the delay cap
    pub fn with_max_ms(mut self, ms: u64) -> Self {
        self.max_ms = ms;
        self
    }

    /// Set the growth factor
    pub fn with_factor(mut self, factor: u32) -> Self {
        self.factor = factor;
        self
    }

    /// Set the stall limit for shuttle turnaround
    pub fn with_reverse_after(mut self, attempts: Option<u32>) -> Self {
        self.reverse_after = attempts;
        self
    }

    /// Delay before retry number `attempt` (0-based), capped at `max_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let growth = u64::from(self.factor).saturating_pow(attempt);
        self.initial_ms.saturating_mul(growth).min(self.max_ms)
    }

    /// Check the parameters are consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.factor == 0 || self.initial_ms > self.max_ms || self.reverse_after == Some(0) {
            return Err(ConfigError::InvalidBackoff);
        }
        Ok(())
    }
}

// ============================================================================
// Train Config
// ============================================================================

/// One train
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainConfig {
    /// Train identity
    pub id: TrainId,
    /// Display name
    pub name: ShortString,
    /// Explicit route, head end last; wins over `from`/`to`
    pub route: Option<Vec<Coordinates>>,
    /// Planned route start
    pub from: Option<Coordinates>,
    /// Waypoints the planned route must pass, in order
    pub via: Vec<Coordinates>,
    /// Planned route end
    pub to: Option<Coordinates>,
    /// Wagon count override
    pub wagons: Option<usize>,
    /// Behaviour at the end of the route
    pub mode: RouteMode,
    /// For shuttles: stop after this many one-way runs
    pub laps: Option<u32>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::new(TrainId(1), "")
    }
}

impl TrainConfig {
    /// A train with no route yet
    pub fn new(id: TrainId, name: &str) -> Self {
        Self {
            id,
            name: short_string(name),
            route: None,
            from: None,
            via: Vec::new(),
            to: None,
            wagons: None,
            mode: RouteMode::OneWay,
            laps: None,
        }
    }

    /// Use an explicit route
    pub fn with_route(mut self, route: Vec<Coordinates>) -> Self {
        self.route = Some(route);
        self
    }

    /// Plan the route between two tiles
    pub fn with_endpoints(mut self, from: Coordinates, to: Coordinates) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Add a waypoint to the planned route
    pub fn with_via(mut self, at: Coordinates) -> Self {
        self.via.push(at);
        self
    }

    /// Override the wagon count
    pub fn with_wagons(mut self, wagons: usize) -> Self {
        self.wagons = Some(wagons);
        self
    }

    /// Set the route mode
    pub fn with_mode(mut self, mode: RouteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bound the number of shuttle runs
    pub fn with_laps(mut self, laps: u32) -> Self {
        self.laps = Some(laps);
        self
    }

    fn plan(&self, grid: &TunnelsGrid, default_wagons: usize) -> Result<TrainPlan, ConfigError> {
        let wagons = self.wagons.unwrap_or(default_wagons);
        let route = match (&self.route, self.from, self.to) {
            (Some(cells), _, _) => Route::new(self.id, cells.clone(), wagons, grid)?,
            (None, Some(from), Some(to)) => Route::plan(self.id, grid, from, &self.via, to, wagons)?,
            _ => return Err(ConfigError::MissingRoute { train: self.id }),
        };
        if self.mode == RouteMode::Shuttle && route.len() <= wagons {
            return Err(ConfigError::ShuttleTooShort {
                train: self.id,
                len: route.len(),
                wagons,
            });
        }
        Ok(TrainPlan {
            id: self.id,
            name: self.name.clone(),
            route,
            wagons,
            mode: self.mode,
            laps: self.laps,
        })
    }
}

/// A train with its route resolved and validated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainPlan {
    /// Train identity
    pub id: TrainId,
    /// Display name
    pub name: ShortString,
    /// Validated route
    pub route: Route,
    /// Wagon count
    pub wagons: usize,
    /// Behaviour at the end of the route
    pub mode: RouteMode,
    /// For shuttles: stop after this many one-way runs
    pub laps: Option<u32>,
}

impl TrainPlan {
    /// Tiles the train occupies before its first advance, head first.
    pub fn initial_window(&self) -> Vec<Coordinates> {
        self.route
            .window(self.wagons - 1, self.wagons)
            .unwrap_or_default()
    }
}
