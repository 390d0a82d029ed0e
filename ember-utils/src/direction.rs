//! The six axis directions, plus the fixed neighbour-update order used by the
//! block-update engine.

/// The three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One of the six axis-aligned directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Negative Y.
    Down = 0,
    /// Positive Y.
    Up = 1,
    /// Negative Z.
    North = 2,
    /// Positive Z.
    South = 3,
    /// Negative X.
    West = 4,
    /// Positive X.
    East = 5,
}

impl Direction {
    /// All six directions, indexable by discriminant.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// The four horizontal directions in the order the redstone wire side
    /// properties are declared: +x, -z, +z, -x.
    pub const REDSTONE_ORDER: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::South,
        Direction::West,
    ];

    /// Neighbour-update push order: -x, +x, -z, +z, -y, +y. A fixed order
    /// makes cascades deterministic at the cost of rotation dependence.
    pub const UPDATE_ORDER: [Direction; 6] = [
        Direction::West,
        Direction::East,
        Direction::North,
        Direction::South,
        Direction::Down,
        Direction::Up,
    ];

    /// Returns the block offset for this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// Returns the axis this direction lies on.
    #[must_use]
    pub const fn axis(self) -> Axis {
        match self {
            Direction::Down | Direction::Up => Axis::Y,
            Direction::North | Direction::South => Axis::Z,
            Direction::West | Direction::East => Axis::X,
        }
    }

    /// Whether this direction is horizontal.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(
            self,
            Direction::North | Direction::South | Direction::West | Direction::East
        )
    }

    /// Rotates a horizontal direction 90 degrees clockwise (viewed from
    /// above). Vertical directions are returned unchanged.
    #[must_use]
    pub const fn rotate_clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            other => other,
        }
    }

    /// Rotates a horizontal direction 90 degrees counter-clockwise.
    #[must_use]
    pub const fn rotate_counter_clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            other => other,
        }
    }

    /// Index of this direction within [`Self::REDSTONE_ORDER`].
    ///
    /// # Panics
    /// Panics when called with a vertical direction.
    #[must_use]
    pub fn horizontal_index(self) -> usize {
        match self {
            Direction::East => 0,
            Direction::North => 1,
            Direction::South => 2,
            Direction::West => 3,
            Direction::Down | Direction::Up => {
                unreachable!("vertical direction has no horizontal index")
            }
        }
    }

    /// Face bit used by the block model face masks.
    #[must_use]
    pub const fn face_bit(self) -> u8 {
        1 << (self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposites_cancel() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn clockwise_full_turn() {
        let mut dir = Direction::North;
        for _ in 0..4 {
            dir = dir.rotate_clockwise();
        }
        assert_eq!(dir, Direction::North);
        assert_eq!(
            Direction::North.rotate_clockwise().rotate_counter_clockwise(),
            Direction::North
        );
    }

    #[test]
    fn redstone_order_indices() {
        for (i, dir) in Direction::REDSTONE_ORDER.iter().enumerate() {
            assert_eq!(dir.horizontal_index(), i);
        }
    }
}
