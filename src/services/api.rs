//! JSON shapes of the HTTP API.
//!
//! Every endpoint answers with an [`ApiResponse`] envelope so clients can
//! check `success` before looking at `data`.

use serde::{Deserialize, Serialize};

use crate::{Coordinates, FieldType, Phase, ShutdownReport, TrackMonitor, TrainId};

/// Generic API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was handled.
    pub success: bool,
    /// Response payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response with a message.
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Tiles held by one train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainCells {
    /// Train identity.
    pub train: TrainId,
    /// Occupied tiles in row-major order.
    pub cells: Vec<Coordinates>,
}

/// GET /api/map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResponse {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// Occupancy generation the map was read at.
    pub generation: u64,
    /// One string per row, occupied tiles drawn with the train digit.
    pub rows: Vec<String>,
    /// Station entrances.
    pub entrances: Vec<Coordinates>,
    /// Occupancy by train.
    pub occupied: Vec<TrainCells>,
}

impl MapResponse {
    /// Read the current map from `monitor`.
    pub fn from_monitor(monitor: &TrackMonitor) -> Self {
        // Generation first: the rows are at least as new as it says.
        let generation = monitor.generation();
        Self {
            width: monitor.width(),
            height: monitor.height(),
            generation,
            rows: monitor.render_ascii().lines().map(str::to_owned).collect(),
            entrances: monitor.stations_entrances().to_vec(),
            occupied: monitor
                .occupancy_snapshot()
                .into_iter()
                .map(|(train, cells)| TrainCells { train, cells })
                .collect(),
        }
    }
}

/// GET /api/field/:row/:col
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResponse {
    /// Tile asked about.
    pub at: Coordinates,
    /// Painted label.
    pub label: FieldType,
    /// Train standing on the tile.
    pub occupant: Option<TrainId>,
    /// Trains whose course runs through the tile.
    pub courses: Vec<TrainId>,
    /// Whether the tile is a station entrance.
    pub entrance: bool,
    /// Whether some train is waiting for the tile.
    pub contended: bool,
}

impl FieldResponse {
    /// Describe `at`, or `None` when it is off the map.
    pub fn from_monitor(monitor: &TrackMonitor, at: Coordinates) -> Option<Self> {
        let label = monitor.get_field(at)?;
        let entrance = monitor.stations_entrances().contains(&at);
        Some(Self {
            at,
            label,
            occupant: monitor.occupant(at),
            courses: monitor.courses_through(at),
            entrance,
            contended: if entrance {
                monitor.is_thread_waiting(at)
            } else {
                monitor.is_cell_contended(at)
            },
        })
    }
}

/// Result of a lifecycle command (start, pause, restart).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Command that was applied.
    pub action: String,
    /// Phase after the command.
    pub phase: Phase,
    /// Trains whose state the command changed.
    pub affected: usize,
}

impl CommandResponse {
    /// Build a response.
    pub fn new(action: impl Into<String>, phase: Phase, affected: usize) -> Self {
        Self {
            action: action.into(),
            phase,
            affected,
        }
    }
}

/// POST /api/end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndResponse {
    /// Train units that were joined.
    pub joined: usize,
    /// Trains that faulted on their route.
    pub faulted: Vec<TrainId>,
    /// Trains whose thread panicked.
    pub panicked: Vec<TrainId>,
    /// Tiles the controller released after the units stopped.
    pub released_cells: usize,
    /// Run time in milliseconds, if the simulation was started.
    pub elapsed_ms: Option<u64>,
}

impl From<&ShutdownReport> for EndResponse {
    fn from(report: &ShutdownReport) -> Self {
        Self {
            joined: report.reports.len(),
            faulted: report
                .reports
                .iter()
                .filter(|r| r.reason.is_faulted())
                .map(|r| r.train)
                .collect(),
            panicked: report.panicked.clone(),
            released_cells: report.released_cells,
            elapsed_ms: report.elapsed.map(|d| d.as_millis() as u64),
        }
    }
}
