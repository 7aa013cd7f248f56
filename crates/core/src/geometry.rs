//! Cell coordinates and faces.

use serde::{Deserialize, Serialize};

/// Integer coordinate of a single cell in the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// East/west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North/south axis.
    pub z: i32,
}

impl BlockPos {
    /// Build a position from its three components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Position of the cell adjacent to this one across `facing`.
    ///
    /// Coordinates wrap at the edges of the `i32` range.
    pub fn offset(self, facing: Facing) -> Self {
        let (dx, dy, dz) = facing.delta();
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six faces of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Facing {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Facing {
    /// Every face, in ordinal order.
    pub const ALL: [Facing; 6] = [
        Facing::Down,
        Facing::Up,
        Facing::North,
        Facing::South,
        Facing::West,
        Facing::East,
    ];

    /// The face pointing the other way.
    pub fn opposite(self) -> Self {
        match self {
            Facing::Down => Facing::Up,
            Facing::Up => Facing::Down,
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
            Facing::East => Facing::West,
        }
    }

    fn delta(self) -> (i32, i32, i32) {
        match self {
            Facing::Down => (0, -1, 0),
            Facing::Up => (0, 1, 0),
            Facing::North => (0, 0, -1),
            Facing::South => (0, 0, 1),
            Facing::West => (-1, 0, 0),
            Facing::East => (1, 0, 0),
        }
    }

    /// Lowercase label used in status lines.
    pub fn label(self) -> &'static str {
        match self {
            Facing::Down => "down",
            Facing::Up => "up",
            Facing::North => "north",
            Facing::South => "south",
            Facing::West => "west",
            Facing::East => "east",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_back_returns_origin() {
        let origin = BlockPos::new(3, 64, -7);
        for facing in Facing::ALL {
            assert_eq!(origin.offset(facing).offset(facing.opposite()), origin);
            assert_ne!(origin.offset(facing), origin);
        }
    }

    #[test]
    fn offset_wraps_at_the_coordinate_edges() {
        let edge = BlockPos::new(i32::MAX, i32::MIN, 0);
        assert_eq!(edge.offset(Facing::East).x, i32::MIN);
        assert_eq!(edge.offset(Facing::Down).y, i32::MAX);
        assert_eq!(edge.offset(Facing::East).offset(Facing::West), edge);
    }

    #[test]
    fn opposite_is_an_involution() {
        for facing in Facing::ALL {
            assert_ne!(facing.opposite(), facing);
            assert_eq!(facing.opposite().opposite(), facing);
        }
    }
}
