//! Tile labels and train identities.
//!
//! A tile on the tunnel map carries one [`FieldType`] label. Labels are
//! painted before the simulation starts and describe the layout (walls,
//! stations) and which train's path runs through a tile. They are *not*
//! runtime occupancy: that lives in the [`TrackMonitor`](crate::TrackMonitor).

use core::fmt;

/// Identity of a train.
///
/// Open-ended rather than a fixed `T1`/`T2`/`T3` set, so a layout can
/// carry any number of trains. Displays as `T<n>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TrainId(pub u16);

impl TrainId {
    /// Numeric value of the identity.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Label of a single tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldType {
    /// Open tunnel.
    #[default]
    Empty,
    /// Solid rock, never traversable.
    Wall,
    /// A station platform. Trains stop at its entrances, never on it.
    Station,
    /// Open tunnel belonging to the painted path of a train.
    TrainPath(TrainId),
}

impl FieldType {
    /// Whether a train may ever stand on this tile.
    #[inline]
    pub fn is_traversable(self) -> bool {
        matches!(self, FieldType::Empty | FieldType::TrainPath(_))
    }

    /// Single-character rendering used by layout rows and map printing.
    ///
    /// Train paths render as the last digit of the train number.
    pub fn symbol(self) -> char {
        match self {
            FieldType::Empty => '.',
            FieldType::Wall => '#',
            FieldType::Station => 'S',
            FieldType::TrainPath(id) => {
                char::from_digit(u32::from(id.get() % 10), 10).unwrap_or('?')
            }
        }
    }

    /// Parse a layout character. Only the layout kinds (`.`, `#`, `S`)
    /// are accepted; train paths are painted, never loaded.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '.' | ' ' => Some(FieldType::Empty),
            '#' | 'W' => Some(FieldType::Wall),
            'S' => Some(FieldType::Station),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Empty => f.write_str("EMPTY"),
            FieldType::Wall => f.write_str("WALL"),
            FieldType::Station => f.write_str("STATION"),
            FieldType::TrainPath(id) => write!(f, "{id}"),
        }
    }
}
