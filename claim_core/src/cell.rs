use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for an independent map namespace. Claims in different worlds never interact.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Offsets of the four edge neighbours (west, east, north, south).
pub const EDGE_NEIGHBORS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// One claimable unit of space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// The same coordinate shifted by `(dx, dz)` in this cell's world, or
    /// `None` past the edge of the coordinate space.
    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            world: self.world,
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// The four 4-adjacent cells.
    pub fn edge_neighbors(self) -> impl Iterator<Item = Cell> {
        EDGE_NEIGHBORS
            .into_iter()
            .filter_map(move |(dx, dz)| self.offset(dx, dz))
    }

    /// Every cell within Chebyshev distance `radius`, excluding `self`.
    pub fn square_ring(self, radius: u32) -> impl Iterator<Item = Cell> {
        let r = radius as i32;
        (-r..=r)
            .flat_map(move |dz| (-r..=r).map(move |dx| (dx, dz)))
            .filter(|&(dx, dz)| dx != 0 || dz != 0)
            .filter_map(move |(dx, dz)| self.offset(dx, dz))
    }

    /// Chebyshev distance, or `None` when the cells live in different worlds.
    pub fn chebyshev(self, other: Cell) -> Option<u32> {
        if self.world != other.world {
            return None;
        }
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dz = (self.z as i64 - other.z as i64).unsigned_abs();
        Some(dx.max(dz).min(u32::MAX as u64) as u32)
    }

    pub fn is_edge_adjacent(self, other: Cell) -> bool {
        if self.world != other.world {
            return false;
        }
        let dx = (self.x as i64 - other.x as i64).abs();
        let dz = (self.z as i64 - other.z as i64).abs();
        dx + dz == 1
    }

    /// Row-major ordering key: world, then z, then x.
    #[inline]
    pub fn row_major_key(self) -> (WorldId, i32, i32) {
        (self.world, self.z, self.x)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.world, self.x, self.z)
    }
}
