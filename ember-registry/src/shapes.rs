//! Block shape models.
//!
//! A model is a small list of axis-aligned boxes plus three precomputed face
//! masks, one bit per [`Direction`]:
//!
//! - `full_faces`: the face toward that direction is fully covered,
//! - `pole_faces`: the face has at least a centred stub (enough to carry
//!   torches, pressure plates and the like),
//! - `non_empty_faces`: any box touches the face at all.

use ember_utils::Direction;
use ember_utils::math::BoxF;
use smallvec::SmallVec;

/// Index of a model in the registry's model table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelId(pub u16);

/// A block shape: boxes plus derived face masks.
#[derive(Debug, Clone, Default)]
pub struct BlockModel {
    /// The boxes making up the shape.
    pub boxes: SmallVec<[BoxF; 2]>,
    /// Faces fully covered by some box.
    pub full_faces: u8,
    /// Faces carrying a centred support stub.
    pub pole_faces: u8,
    /// Faces touched by any box.
    pub non_empty_faces: u8,
}

const EPSILON: f32 = 1.0e-5;
/// The centred stub a pole face must cover, in block fractions.
const POLE_MIN: f32 = 7.0 / 16.0;
const POLE_MAX: f32 = 9.0 / 16.0;

/// The 2D footprint of a box on the face toward `dir`, or `None` when the box
/// does not reach that face.
fn face_rect(bx: &BoxF, dir: Direction) -> Option<(f32, f32, f32, f32)> {
    let (at_face, rect) = match dir {
        Direction::Down => (bx.min_y <= EPSILON, (bx.min_x, bx.min_z, bx.max_x, bx.max_z)),
        Direction::Up => (bx.max_y >= 1.0 - EPSILON, (bx.min_x, bx.min_z, bx.max_x, bx.max_z)),
        Direction::North => (bx.min_z <= EPSILON, (bx.min_x, bx.min_y, bx.max_x, bx.max_y)),
        Direction::South => (bx.max_z >= 1.0 - EPSILON, (bx.min_x, bx.min_y, bx.max_x, bx.max_y)),
        Direction::West => (bx.min_x <= EPSILON, (bx.min_y, bx.min_z, bx.max_y, bx.max_z)),
        Direction::East => (bx.max_x >= 1.0 - EPSILON, (bx.min_y, bx.min_z, bx.max_y, bx.max_z)),
    };
    at_face.then_some(rect)
}

fn rect_contains(rect: (f32, f32, f32, f32), min_a: f32, min_b: f32, max_a: f32, max_b: f32) -> bool {
    rect.0 <= min_a + EPSILON
        && rect.1 <= min_b + EPSILON
        && rect.2 >= max_a - EPSILON
        && rect.3 >= max_b - EPSILON
}

impl BlockModel {
    /// A model with no boxes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a model from boxes and computes the face masks.
    #[must_use]
    pub fn from_boxes(boxes: &[BoxF]) -> Self {
        let mut model = Self {
            boxes: SmallVec::from_slice(boxes),
            ..Self::default()
        };
        for dir in Direction::ALL {
            let bit = dir.face_bit();
            for bx in &model.boxes {
                let Some(rect) = face_rect(bx, dir) else {
                    continue;
                };
                model.non_empty_faces |= bit;
                if rect_contains(rect, 0.0, 0.0, 1.0, 1.0) {
                    model.full_faces |= bit;
                }
                if rect_contains(rect, POLE_MIN, POLE_MIN, POLE_MAX, POLE_MAX) {
                    model.pole_faces |= bit;
                }
            }
        }
        model
    }

    /// The full unit cube.
    #[must_use]
    pub fn full_cube() -> Self {
        Self::from_boxes(&[BoxF::FULL])
    }

    /// Whether the face toward `dir` is fully covered.
    #[must_use]
    pub fn is_face_full(&self, dir: Direction) -> bool {
        self.full_faces & dir.face_bit() != 0
    }

    /// Whether the face toward `dir` carries a centred support stub.
    #[must_use]
    pub fn is_face_pole(&self, dir: Direction) -> bool {
        self.pole_faces & dir.face_bit() != 0
    }

    /// Returns a copy translated by the given offsets.
    #[must_use]
    pub fn translated(&self, dx: f32, dy: f32, dz: f32) -> Self {
        // Face masks are position-independent for collision purposes; only
        // the boxes move.
        Self {
            boxes: self.boxes.iter().map(|b| b.translated(dx, dy, dz)).collect(),
            full_faces: self.full_faces,
            pole_faces: self.pole_faces,
            non_empty_faces: self.non_empty_faces,
        }
    }
}

/// How light passes between two adjacent occlusion models.
///
/// Each model contributes its occluding rectangles on the shared face; light
/// passes iff the union of those rectangles does not cover the whole face.
/// Our models are plain boxes, so the union test reduces to: no single
/// contributed face rectangle covers the full face. Occlusion models in the
/// registry are either empty or the full cube, which this test handles
/// exactly.
#[must_use]
pub fn light_can_propagate(from: &BlockModel, to: &BlockModel, dir: Direction) -> bool {
    !from.is_face_full(dir) && !to.is_face_full(dir.opposite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cube_faces() {
        let model = BlockModel::full_cube();
        assert_eq!(model.full_faces, 0x3F);
        assert_eq!(model.pole_faces, 0x3F);
        assert_eq!(model.non_empty_faces, 0x3F);
    }

    #[test]
    fn empty_model_faces() {
        let model = BlockModel::empty();
        assert_eq!(model.full_faces, 0);
        assert_eq!(model.non_empty_faces, 0);
    }

    #[test]
    fn fence_post_is_pole_not_full() {
        let post = BlockModel::from_boxes(&[BoxF::from_pixels(6.0, 0.0, 6.0, 10.0, 24.0, 10.0)]);
        assert!(post.is_face_pole(Direction::Down));
        assert!(!post.is_face_full(Direction::Down));
    }

    #[test]
    fn light_blocked_by_full_face() {
        let full = BlockModel::full_cube();
        let empty = BlockModel::empty();
        assert!(!light_can_propagate(&full, &empty, Direction::Up));
        assert!(!light_can_propagate(&empty, &full, Direction::Up));
        assert!(light_can_propagate(&empty, &empty, Direction::Up));
    }
}
