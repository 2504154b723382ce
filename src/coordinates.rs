//! Row/column coordinates of a tile on the tunnel map.
//!
//! [`Coordinates`] is a small `Copy` value used as the key for every
//! grid lookup, occupancy entry, and station gate.
//!
//! # Example
//!
//! ```rust
//! use rs_metro::Coordinates;
//!
//! let mut wagon = Coordinates::new(0, 1);
//! let next = Coordinates::new(0, 2);
//! assert!(wagon.is_adjacent(next));
//!
//! wagon.move_to(next);
//! assert_eq!(wagon, next);
//! assert_eq!(wagon.to_string(), "(0,2)");
//! ```

use core::fmt;

/// A `(row, col)` position on the tunnel map.
///
/// Rows grow downwards, columns grow to the right. Equality and hashing
/// use both fields, so coordinates can key maps and sets directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinates {
    /// Row index (0 = top).
    pub row: usize,
    /// Column index (0 = left).
    pub col: usize,
}

impl Coordinates {
    /// Create a coordinate pair.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row index.
    #[inline]
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Column index.
    #[inline]
    pub const fn col(&self) -> usize {
        self.col
    }

    /// Move this point to `target` in place.
    ///
    /// Used by a train to shift its own tracked wagon positions; the value
    /// is never shared, so this is a plain overwrite.
    pub fn move_to(&mut self, target: Coordinates) {
        *self = target;
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(&self, other: Coordinates) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Whether `other` shares an edge with this tile.
    pub fn is_adjacent(&self, other: Coordinates) -> bool {
        self.manhattan(other) == 1
    }

    /// The up to four edge-sharing neighbours inside a `width × height` map.
    pub fn neighbours4(&self, width: usize, height: usize) -> impl Iterator<Item = Coordinates> {
        const STEPS: [(isize, isize); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];
        let origin = *self;
        STEPS
            .into_iter()
            .filter_map(move |(dr, dc)| origin.offset(dr, dc, width, height))
    }

    /// The up to eight surrounding tiles (edges and corners) inside a
    /// `width × height` map.
    pub fn neighbours8(&self, width: usize, height: usize) -> impl Iterator<Item = Coordinates> {
        let origin = *self;
        (-1isize..=1)
            .flat_map(|dr| (-1isize..=1).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .filter_map(move |(dr, dc)| origin.offset(dr, dc, width, height))
    }

    fn offset(&self, dr: isize, dc: isize, width: usize, height: usize) -> Option<Coordinates> {
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < height && col < width).then_some(Coordinates { row, col })
    }
}

impl From<(usize, usize)> for Coordinates {
    fn from((row, col): (usize, usize)) -> Self {
        Self::new(row, col)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}
