//! Error types for the monitor, configuration, and simulation lifecycle.
//!
//! Contention is never an error: a train that cannot advance yet either
//! waits or gets [`Advance::Blocked`](crate::Advance::Blocked). Everything
//! here is either a contract violation (a layout or logic defect) or a
//! cooperative interruption.

use core::fmt;

use crate::coordinates::Coordinates;
use crate::field::TrainId;

/// Errors reported by [`TrackMonitor`](crate::TrackMonitor) and the
/// station gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// The coordinate lies outside the map.
    OutOfBounds {
        /// Offending coordinate.
        at: Coordinates,
    },
    /// A train was asked to stand on a wall tile.
    WallCell {
        /// The wall tile.
        at: Coordinates,
    },
    /// A train was asked to stand on a station platform tile.
    StationCell {
        /// The station tile.
        at: Coordinates,
    },
    /// The train does not hold every tile of the window it claims to occupy.
    NotOwner {
        /// Train that made the request.
        train: TrainId,
        /// First tile it does not hold.
        at: Coordinates,
    },
    /// The caller was interrupted while waiting; nothing was changed.
    Interrupted {
        /// Train whose wait was cancelled.
        train: TrainId,
    },
    /// Painting was requested while trains are in service.
    PaintingWhileActive {
        /// Number of units currently in service.
        active: usize,
    },
    /// The train already holds tiles on the map.
    AlreadyPlaced {
        /// Train being placed twice.
        train: TrainId,
    },
    /// Initial placement collided with another train.
    Occupied {
        /// Contested tile.
        at: Coordinates,
        /// Train holding it.
        by: TrainId,
    },
    /// The coordinate is not a station entrance.
    UnknownEntrance {
        /// Offending coordinate.
        at: Coordinates,
    },
    /// A window is empty or repeats a tile.
    MalformedWindow,
}

impl MonitorError {
    /// Whether this error signals a layout or logic defect (fatal to the
    /// calling unit) rather than cancellation or placement contention.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            MonitorError::Interrupted { .. } | MonitorError::Occupied { .. }
        )
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { at } => write!(f, "coordinate {at} is outside the map"),
            Self::WallCell { at } => write!(f, "tile {at} is a wall"),
            Self::StationCell { at } => write!(f, "tile {at} is a station platform"),
            Self::NotOwner { train, at } => write!(f, "train {train} does not hold tile {at}"),
            Self::Interrupted { train } => write!(f, "train {train} was interrupted while waiting"),
            Self::PaintingWhileActive { active } => {
                write!(f, "cannot paint the map while {active} train(s) are in service")
            }
            Self::AlreadyPlaced { train } => write!(f, "train {train} is already on the map"),
            Self::Occupied { at, by } => write!(f, "tile {at} is occupied by train {by}"),
            Self::UnknownEntrance { at } => write!(f, "tile {at} is not a station entrance"),
            Self::MalformedWindow => write!(f, "train window is empty or repeats a tile"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Errors in a [`SimulationConfig`](crate::SimulationConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Width or height is zero.
    EmptyMap,
    /// A layout row has a different width than the first row.
    RaggedRow {
        /// Row index.
        row: usize,
        /// Expected width.
        expected: usize,
        /// Actual width.
        found: usize,
    },
    /// Unknown character in a layout row.
    BadSymbol {
        /// Position of the character.
        at: Coordinates,
        /// The character.
        symbol: char,
    },
    /// A configured coordinate lies outside the map.
    OutOfBounds {
        /// Offending coordinate.
        at: Coordinates,
    },
    /// A route is shorter than the train it carries.
    RouteTooShort {
        /// Train.
        train: TrainId,
        /// Route length.
        len: usize,
        /// Wagons required.
        wagons: usize,
    },
    /// A shuttle route leaves no room to move: after turning around the
    /// train would already be at the far end.
    ShuttleTooShort {
        /// Train.
        train: TrainId,
        /// Route length.
        len: usize,
        /// Wagons of the train.
        wagons: usize,
    },
    /// Two consecutive route tiles do not share an edge.
    Discontinuous {
        /// Train.
        train: TrainId,
        /// Tile before the gap.
        from: Coordinates,
        /// Tile after the gap.
        to: Coordinates,
    },
    /// A train has neither an explicit route nor both endpoints.
    MissingRoute {
        /// Train.
        train: TrainId,
    },
    /// No path exists between the configured endpoints.
    Unreachable {
        /// Train.
        train: TrainId,
        /// Start of the requested route.
        from: Coordinates,
        /// End of the requested route.
        to: Coordinates,
    },
    /// Two trains share an identity.
    DuplicateTrain {
        /// Repeated identity.
        train: TrainId,
    },
    /// The start order mentions an unknown train or omits/repeats one.
    BadStartOrder {
        /// Offending identity.
        train: TrainId,
    },
    /// `number_of_trains` does not match the train list.
    TrainCount {
        /// Declared count.
        declared: usize,
        /// Trains actually listed.
        listed: usize,
    },
    /// A train has zero wagons.
    NoWagons {
        /// Train.
        train: TrainId,
    },
    /// Backoff parameters are inconsistent.
    InvalidBackoff,
    /// Configuration text failed to parse.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMap => write!(f, "map must have a non-zero width and height"),
            Self::RaggedRow {
                row,
                expected,
                found,
            } => write!(f, "layout row {row} has width {found}, expected {expected}"),
            Self::BadSymbol { at, symbol } => write!(f, "unknown layout symbol {symbol:?} at {at}"),
            Self::OutOfBounds { at } => write!(f, "configured coordinate {at} is outside the map"),
            Self::RouteTooShort { train, len, wagons } => write!(
                f,
                "route of train {train} has {len} tile(s) but the train needs {wagons}"
            ),
            Self::ShuttleTooShort { train, len, wagons } => write!(
                f,
                "shuttle train {train} needs more than {wagons} route tile(s), route has {len}"
            ),
            Self::Discontinuous { train, from, to } => {
                write!(f, "route of train {train} jumps from {from} to {to}")
            }
            Self::MissingRoute { train } => {
                write!(f, "train {train} needs a route or both from/to endpoints")
            }
            Self::Unreachable { train, from, to } => {
                write!(f, "no tunnel connects {from} to {to} for train {train}")
            }
            Self::DuplicateTrain { train } => write!(f, "train {train} is configured twice"),
            Self::BadStartOrder { train } => write!(f, "start order is invalid at train {train}"),
            Self::TrainCount { declared, listed } => write!(
                f,
                "number_of_trains is {declared} but {listed} train(s) are listed"
            ),
            Self::NoWagons { train } => write!(f, "train {train} has no wagons"),
            Self::InvalidBackoff => write!(f, "backoff needs initial_ms <= max_ms, factor >= 1 and reverse_after >= 1"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from [`SimulationController`](crate::SimulationController).
#[derive(Debug)]
pub enum SimulationError {
    /// Invalid configuration.
    Config(ConfigError),
    /// The monitor rejected setup (painting or placement).
    Monitor(MonitorError),
    /// `start()` was called twice.
    AlreadyStarted,
    /// The simulation has already ended.
    Ended,
    /// A train thread could not be spawned.
    Spawn(std::io::Error),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Monitor(e) => write!(f, "{e}"),
            Self::AlreadyStarted => write!(f, "simulation already started"),
            Self::Ended => write!(f, "simulation has ended"),
            Self::Spawn(e) => write!(f, "failed to spawn train thread: {e}"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Monitor(e) => Some(e),
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<MonitorError> for SimulationError {
    fn from(e: MonitorError) -> Self {
        Self::Monitor(e)
    }
}
