//! Train routes: ordered, edge-connected tile sequences.
//!
//! A train of `n` wagons covers `n` consecutive route tiles. It starts on
//! the first `n` tiles with its head on tile `n - 1`, and each advance
//! slides that window one tile along the route.
//!
//! Routes are checked structurally here (bounds, adjacency, length). The
//! tile kinds along a route are checked by the
//! [`TrackMonitor`](crate::TrackMonitor) as the train moves, so a route
//! running into a wall faults the train at that step.
//!
//! ```rust
//! use rs_metro::{Coordinates, TunnelsGrid};
//! use rs_metro::route::plan_route;
//!
//! let grid = TunnelsGrid::from_rows(&[
//!     "...",
//!     ".#.",
//!     "...",
//! ]).unwrap();
//! let path = plan_route(&grid, Coordinates::new(0, 0), Coordinates::new(2, 2)).unwrap();
//! assert_eq!(path.len(), 5);
//! assert_eq!(path.first(), Some(&Coordinates::new(0, 0)));
//! assert_eq!(path.last(), Some(&Coordinates::new(2, 2)));
//! ```

use pathfinding::prelude::astar;

use crate::coordinates::Coordinates;
use crate::error::ConfigError;
use crate::field::TrainId;
use crate::grid::TunnelsGrid;

/// What a train does when its head reaches the end of the route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RouteMode {
    /// Stop and leave the map.
    #[default]
    OneWay,
    /// Turn around (head and tail swap) and run back along the route.
    Shuttle,
}

/// A validated route for one train.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    train: TrainId,
    cells: Vec<Coordinates>,
}

impl Route {
    /// Validate an explicit route for a train of `wagons` wagons.
    pub fn new(
        train: TrainId,
        cells: Vec<Coordinates>,
        wagons: usize,
        grid: &TunnelsGrid,
    ) -> Result<Self, ConfigError> {
        if wagons == 0 {
            return Err(ConfigError::NoWagons { train });
        }
        if cells.len() < wagons {
            return Err(ConfigError::RouteTooShort {
                train,
                len: cells.len(),
                wagons,
            });
        }
        if let Some(&at) = cells.iter().find(|&&c| !grid.contains(c)) {
            return Err(ConfigError::OutOfBounds { at });
        }
        if let Some(pair) = cells.windows(2).find(|w| !w[0].is_adjacent(w[1])) {
            return Err(ConfigError::Discontinuous {
                train,
                from: pair[0],
                to: pair[1],
            });
        }
        Ok(Self { train, cells })
    }

    /// Plan the shortest route from `from` to `to`, passing through every
    /// tile of `via` in order.
    pub fn plan(
        train: TrainId,
        grid: &TunnelsGrid,
        from: Coordinates,
        via: &[Coordinates],
        to: Coordinates,
        wagons: usize,
    ) -> Result<Self, ConfigError> {
        let mut stops = Vec::with_capacity(via.len() + 2);
        stops.push(from);
        stops.extend_from_slice(via);
        stops.push(to);

        if let Some(&at) = stops.iter().find(|&&c| !grid.contains(c)) {
            return Err(ConfigError::OutOfBounds { at });
        }

        let mut cells: Vec<Coordinates> = vec![from];
        for leg in stops.windows(2) {
            let path = plan_route(grid, leg[0], leg[1]).ok_or(ConfigError::Unreachable {
                train,
                from: leg[0],
                to: leg[1],
            })?;
            cells.extend(path.into_iter().skip(1));
        }
        Self::new(train, cells, wagons, grid)
    }

    /// Train this route belongs to.
    pub fn train(&self) -> TrainId {
        self.train
    }

    /// Route tiles in travel order.
    pub fn cells(&self) -> &[Coordinates] {
        &self.cells
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false for a validated route.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// First tile.
    pub fn start(&self) -> Option<Coordinates> {
        self.cells.first().copied()
    }

    /// Last tile.
    pub fn end(&self) -> Option<Coordinates> {
        self.cells.last().copied()
    }

    /// The same route travelled backwards.
    pub fn reversed(&self) -> Route {
        let mut cells = self.cells.clone();
        cells.reverse();
        Route {
            train: self.train,
            cells,
        }
    }

    /// Tiles covered by a train of `wagons` wagons whose head is on route
    /// index `head`, head first. `None` if the window does not fit.
    pub fn window(&self, head: usize, wagons: usize) -> Option<Vec<Coordinates>> {
        if wagons == 0 || head >= self.cells.len() || head + 1 < wagons {
            return None;
        }
        Some(self.cells[head + 1 - wagons..=head].iter().rev().copied().collect())
    }
}

/// Shortest edge-connected path from `from` to `to` over traversable
/// tiles, both ends included. `None` when no path exists or an endpoint
/// is not traversable.
pub fn plan_route(grid: &TunnelsGrid, from: Coordinates, to: Coordinates) -> Option<Vec<Coordinates>> {
    let walkable = |c: Coordinates| grid.get(c).is_some_and(|f| f.is_traversable());
    if !walkable(from) || !walkable(to) {
        return None;
    }
    if from == to {
        return Some(vec![from]);
    }

    let (width, height) = (grid.width(), grid.height());
    astar(
        &from,
        |c| {
            c.neighbours4(width, height)
                .filter(|&n| walkable(n))
                .map(|n| (n, 1usize))
                .collect::<Vec<_>>()
        },
        |c| c.manhattan(to),
        |c| *c == to,
    )
    .map(|(path, _cost)| path)
}
