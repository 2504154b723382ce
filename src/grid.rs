//! The tunnel map: a fixed-size grid of [`FieldType`] labels plus the
//! list of station entrances.
//!
//! `TunnelsGrid` is plain data with no synchronization. Once handed to a
//! [`TrackMonitor`](crate::TrackMonitor) it is only edited through a
//! [`Painter`](crate::Painter).
//!
//! # Layout rows
//!
//! Layouts are described as rows of characters:
//!
//! | Char | Label |
//! |------|-------|
//! | `.`  | [`FieldType::Empty`] |
//! | `#`  | [`FieldType::Wall`] |
//! | `S`  | [`FieldType::Station`] |
//!
//! ```rust
//! use rs_metro::{Coordinates, FieldType, TunnelsGrid};
//!
//! let grid = TunnelsGrid::from_rows(&[
//!     "S...",
//!     "##.#",
//!     "....",
//! ]).unwrap();
//!
//! assert_eq!(grid.width(), 4);
//! assert_eq!(grid.height(), 3);
//! assert_eq!(grid.get(Coordinates::new(1, 0)), Some(FieldType::Wall));
//! // The only non-wall tile touching the station is (0,1)
//! assert_eq!(grid.stations_entrances(), &[Coordinates::new(0, 1)]);
//! ```

use crate::coordinates::Coordinates;
use crate::error::ConfigError;
use crate::field::FieldType;

/// Width of the default metro map.
pub const METRO_WIDTH: usize = 11;
/// Height of the default metro map.
pub const METRO_HEIGHT: usize = 17;

/// Rows of the default metro map: stations in the four corners, a
/// passage across the middle row and three vertical shafts.
const METRO_ROWS: [&str; METRO_HEIGHT] = [
    "S.........S",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    "...........",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    ".####.####.",
    "S.........S",
];

/// Fixed-size grid of tile labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunnelsGrid {
    width: usize,
    height: usize,
    cells: Vec<FieldType>,
    stations: Vec<Coordinates>,
    entrances: Vec<Coordinates>,
}

impl TunnelsGrid {
    /// An all-empty grid with no stations.
    pub fn new(width: usize, height: usize) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyMap);
        }
        Ok(Self {
            width,
            height,
            cells: vec![FieldType::Empty; width * height],
            stations: Vec::new(),
            entrances: Vec::new(),
        })
    }

    /// Build a grid from layout rows. Every `S` becomes a station and
    /// entrances are derived from them.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, ConfigError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        let mut grid = Self::new(width, height)?;

        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != width {
                return Err(ConfigError::RaggedRow {
                    row,
                    expected: width,
                    found,
                });
            }
            for (col, symbol) in line.chars().enumerate() {
                let at = Coordinates::new(row, col);
                let kind =
                    FieldType::from_symbol(symbol).ok_or(ConfigError::BadSymbol { at, symbol })?;
                grid.cells[row * width + col] = kind;
                if kind == FieldType::Station {
                    grid.stations.push(at);
                }
            }
        }

        grid.derive_entrances();
        Ok(grid)
    }

    /// The 11×17 metro map with four corner stations.
    pub fn metro() -> Self {
        // The constant layout is well-formed
        match Self::from_rows(&METRO_ROWS) {
            Ok(grid) => grid,
            Err(e) => unreachable!("built-in metro layout is invalid: {e}"),
        }
    }

    /// Map width (columns).
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Map height (rows).
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `at` lies on the map.
    #[inline]
    pub fn contains(&self, at: Coordinates) -> bool {
        at.row < self.height && at.col < self.width
    }

    /// Label of a tile, or `None` off the map.
    pub fn get(&self, at: Coordinates) -> Option<FieldType> {
        self.index(at).map(|i| self.cells[i])
    }

    /// Overwrite a tile label. Returns the previous label, or `None` if
    /// `at` is off the map (nothing is written).
    pub fn set(&mut self, at: Coordinates, label: FieldType) -> Option<FieldType> {
        let i = self.index(at)?;
        Some(core::mem::replace(&mut self.cells[i], label))
    }

    /// Mark `at` as a station platform and recompute the entrances.
    pub fn add_station(&mut self, at: Coordinates) -> Result<(), ConfigError> {
        if self.set(at, FieldType::Station).is_none() {
            return Err(ConfigError::OutOfBounds { at });
        }
        if !self.stations.contains(&at) {
            self.stations.push(at);
        }
        self.derive_entrances();
        Ok(())
    }

    /// Replace the derived entrances with an explicit list.
    pub fn set_entrances(&mut self, entrances: Vec<Coordinates>) -> Result<(), ConfigError> {
        if let Some(&at) = entrances.iter().find(|&&c| !self.contains(c)) {
            return Err(ConfigError::OutOfBounds { at });
        }
        let mut unique = Vec::with_capacity(entrances.len());
        for c in entrances {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        self.entrances = unique;
        Ok(())
    }

    /// Station platform tiles.
    pub fn stations(&self) -> &[Coordinates] {
        &self.stations
    }

    /// Station entrance tiles, in station order.
    pub fn stations_entrances(&self) -> &[Coordinates] {
        &self.entrances
    }

    /// Whether `at` is a station entrance.
    pub fn is_entrance(&self, at: Coordinates) -> bool {
        self.entrances.contains(&at)
    }

    /// Iterate the labels of one row.
    pub fn row(&self, row: usize) -> &[FieldType] {
        let start = row.min(self.height) * self.width;
        let end = (start + self.width).min(self.cells.len());
        &self.cells[start..end]
    }

    /// Dense tile index of `at`.
    pub(crate) fn index(&self, at: Coordinates) -> Option<usize> {
        self.contains(at).then(|| at.row * self.width + at.col)
    }

    /// Entrances are the traversable tiles surrounding each station,
    /// corners included.
    fn derive_entrances(&mut self) {
        let mut entrances = Vec::new();
        for station in &self.stations {
            for c in station.neighbours8(self.width, self.height) {
                let traversable = self.get(c).is_some_and(FieldType::is_traversable);
                if traversable && !entrances.contains(&c) {
                    entrances.push(c);
                }
            }
        }
        self.entrances = entrances;
    }
}
