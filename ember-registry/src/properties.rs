//! Block state properties.
//!
//! Every property that any registered block declares lives in one global
//! enum. A block's concrete state index is the mixed-radix number formed by
//! its declared properties in declaration order:
//! `state = base_state + Σ(value_index × stride)`, where the stride of a
//! property is the product of the value counts of the properties declared
//! after it.

use ember_utils::Direction;

/// Static description of one property: its disk name, ordered value list and
/// the index of the default value.
#[derive(Debug)]
pub struct PropertySpec {
    /// Name as it appears in region-file palette entries.
    pub name: &'static str,
    /// Ordered value names; the value index is the position in this list.
    pub values: &'static [&'static str],
    /// Index of the default value.
    pub default_index: u8,
}

impl PropertySpec {
    /// Number of values.
    #[must_use]
    pub fn value_count(&self) -> u16 {
        self.values.len() as u16
    }

    /// Looks up a value name, returning its index.
    #[must_use]
    pub fn value_index(&self, value: &str) -> Option<u8> {
        self.values.iter().position(|v| *v == value).map(|i| i as u8)
    }
}

macro_rules! properties {
    ($($variant:ident => $name:literal, [$($value:literal),+ $(,)?], $default:literal;)+) => {
        /// Identifies one block state property.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        #[allow(missing_docs)]
        pub enum Property {
            $($variant,)+
        }

        impl Property {
            /// Number of distinct properties.
            pub const COUNT: usize = [$(Property::$variant,)+].len();

            /// Returns the static spec for this property.
            #[must_use]
            pub const fn spec(self) -> &'static PropertySpec {
                match self {
                    $(Property::$variant => &PropertySpec {
                        name: $name,
                        values: &[$($value),+],
                        default_index: $default,
                    },)+
                }
            }
        }
    };
}

properties! {
    // Booleans. True sorts first, matching the vanilla boolean property order.
    Snowy => "snowy", ["true", "false"], 1;
    Powered => "powered", ["true", "false"], 1;
    Lit => "lit", ["true", "false"], 0;
    Open => "open", ["true", "false"], 1;
    Locked => "locked", ["true", "false"], 1;
    Occupied => "occupied", ["true", "false"], 1;
    InWall => "in_wall", ["true", "false"], 1;
    Waterlogged => "waterlogged", ["true", "false"], 1;
    Persistent => "persistent", ["true", "false"], 1;
    Bottom => "bottom", ["true", "false"], 1;
    Up => "up", ["true", "false"], 0;

    // Cross-connection booleans (fences, panes).
    North => "north", ["true", "false"], 1;
    East => "east", ["true", "false"], 1;
    South => "south", ["true", "false"], 1;
    West => "west", ["true", "false"], 1;

    // Orientations.
    HorizontalFacing => "facing", ["north", "south", "west", "east"], 0;
    Facing => "facing", ["north", "east", "south", "west", "up", "down"], 0;
    AttachFace => "face", ["floor", "wall", "ceiling"], 1;

    // Halves and parts.
    Half => "half", ["top", "bottom"], 1;
    DoubleBlockHalf => "half", ["upper", "lower"], 1;
    Hinge => "hinge", ["left", "right"], 0;
    BedPart => "part", ["head", "foot"], 1;
    StairsShape => "shape",
        ["straight", "inner_left", "inner_right", "outer_left", "outer_right"], 0;

    // Redstone wire visual sides, declared in +x, -z, +z, -x order.
    RedstoneEast => "east", ["up", "side", "none"], 2;
    RedstoneNorth => "north", ["up", "side", "none"], 2;
    RedstoneSouth => "south", ["up", "side", "none"], 2;
    RedstoneWest => "west", ["up", "side", "none"], 2;

    // Wall sides, same order.
    WallEast => "east", ["none", "low", "tall"], 0;
    WallNorth => "north", ["none", "low", "tall"], 0;
    WallSouth => "south", ["none", "low", "tall"], 0;
    WallWest => "west", ["none", "low", "tall"], 0;

    // Numeric ranges. The value index equals the numeric value minus the
    // first entry, which the typed accessors rely on.
    Power => "power",
        ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
         "13", "14", "15"], 0;
    Level => "level",
        ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
         "13", "14", "15"], 0;
    Layers => "layers", ["1", "2", "3", "4", "5", "6", "7", "8"], 0;
    Delay => "delay", ["1", "2", "3", "4"], 0;
    Moisture => "moisture", ["0", "1", "2", "3", "4", "5", "6", "7"], 0;
    Age1 => "age", ["0", "1"], 0;
    Age7 => "age", ["0", "1", "2", "3", "4", "5", "6", "7"], 0;
    Age15 => "age",
        ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
         "13", "14", "15"], 0;
    Stage => "stage", ["0", "1"], 0;
    Distance => "distance", ["1", "2", "3", "4", "5", "6", "7"], 6;

    // Misc enums.
    BambooLeaves => "leaves", ["none", "small", "large"], 0;
    Tilt => "tilt", ["none", "unstable", "partial", "full"], 0;
}

/// The visual connection state of one redstone wire side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RedstoneSide {
    /// Wire runs up the side of the neighbouring block.
    Up = 0,
    /// Wire connects flat.
    Side = 1,
    /// No connection.
    None = 2,
}

impl RedstoneSide {
    /// Converts a stored value index back to the side state.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index {
            0 => RedstoneSide::Up,
            1 => RedstoneSide::Side,
            _ => RedstoneSide::None,
        }
    }

    /// The wire's side property for a horizontal index in redstone order.
    #[must_use]
    pub const fn property(horizontal_index: usize) -> Property {
        match horizontal_index {
            0 => Property::RedstoneEast,
            1 => Property::RedstoneNorth,
            2 => Property::RedstoneSouth,
            _ => Property::RedstoneWest,
        }
    }
}

impl Property {
    /// The fence/pane connection property for a horizontal direction.
    ///
    /// # Panics
    /// Panics on vertical directions.
    #[must_use]
    pub fn cross_connection(dir: Direction) -> Property {
        match dir {
            Direction::North => Property::North,
            Direction::East => Property::East,
            Direction::South => Property::South,
            Direction::West => Property::West,
            Direction::Up | Direction::Down => unreachable!("no vertical connection property"),
        }
    }

    /// The wall side property for a horizontal direction.
    ///
    /// # Panics
    /// Panics on vertical directions.
    #[must_use]
    pub fn wall_side(dir: Direction) -> Property {
        match dir {
            Direction::North => Property::WallNorth,
            Direction::East => Property::WallEast,
            Direction::South => Property::WallSouth,
            Direction::West => Property::WallWest,
            Direction::Up | Direction::Down => unreachable!("no vertical wall side property"),
        }
    }
}

/// Decodes a horizontal facing value index into a direction.
#[must_use]
pub const fn horizontal_facing_from_index(index: u8) -> Direction {
    match index {
        0 => Direction::North,
        1 => Direction::South,
        2 => Direction::West,
        _ => Direction::East,
    }
}

/// Encodes a horizontal direction as a facing value index.
///
/// # Panics
/// Panics on vertical directions.
#[must_use]
pub fn horizontal_facing_to_index(dir: Direction) -> u8 {
    match dir {
        Direction::North => 0,
        Direction::South => 1,
        Direction::West => 2,
        Direction::East => 3,
        Direction::Up | Direction::Down => unreachable!("facing is horizontal"),
    }
}

/// Decodes a six-way facing value index into a direction.
#[must_use]
pub const fn facing_from_index(index: u8) -> Direction {
    match index {
        0 => Direction::North,
        1 => Direction::East,
        2 => Direction::South,
        3 => Direction::West,
        4 => Direction::Up,
        _ => Direction::Down,
    }
}

/// Encodes a direction as a six-way facing value index.
#[must_use]
pub const fn facing_to_index(dir: Direction) -> u8 {
    match dir {
        Direction::North => 0,
        Direction::East => 1,
        Direction::South => 2,
        Direction::West => 3,
        Direction::Up => 4,
        Direction::Down => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_lookup() {
        let spec = Property::RedstoneEast.spec();
        assert_eq!(spec.value_index("side"), Some(1));
        assert_eq!(spec.value_index("nope"), None);
        assert_eq!(spec.value_count(), 3);
    }

    #[test]
    fn numeric_properties_index_as_value() {
        assert_eq!(Property::Power.spec().value_index("13"), Some(13));
        assert_eq!(Property::Layers.spec().value_index("1"), Some(0));
    }

    #[test]
    fn facing_roundtrip() {
        for dir in Direction::ALL {
            assert_eq!(facing_from_index(facing_to_index(dir)), dir);
        }
        for dir in Direction::REDSTONE_ORDER {
            assert_eq!(
                horizontal_facing_from_index(horizontal_facing_to_index(dir)),
                dir
            );
        }
    }
}
