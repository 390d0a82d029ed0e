//! Box math for the block shape tables.

/// An axis-aligned box with single-precision corners, matching the block
/// model tables.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct BoxF {
    pub min_x: f32,
    pub min_y: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub max_z: f32,
}

impl BoxF {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(
        min_x: f32,
        min_y: f32,
        min_z: f32,
        max_x: f32,
        max_y: f32,
        max_z: f32,
    ) -> Self {
        Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }

    /// The full unit cube.
    pub const FULL: BoxF = BoxF::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);

    /// Creates a box from pixel coordinates (16 pixels to a block).
    #[must_use]
    pub const fn from_pixels(
        min_x: f32,
        min_y: f32,
        min_z: f32,
        max_x: f32,
        max_y: f32,
        max_z: f32,
    ) -> Self {
        Self::new(
            min_x / 16.0,
            min_y / 16.0,
            min_z / 16.0,
            max_x / 16.0,
            max_y / 16.0,
            max_z / 16.0,
        )
    }

    /// Returns the box translated by the given offsets.
    #[must_use]
    pub fn translated(self, dx: f32, dy: f32, dz: f32) -> Self {
        Self::new(
            self.min_x + dx,
            self.min_y + dy,
            self.min_z + dz,
            self.max_x + dx,
            self.max_y + dy,
            self.max_z + dz,
        )
    }
}
