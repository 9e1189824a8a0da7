//! Voxel ray traversal.
//!
//! Blocks are unit cubes centred on integer coordinates. A ray visits cells in
//! the order it crosses their faces (Amanatides–Woo traversal) and stops at
//! the first occupied one. The cell the ray starts in is never reported, so a
//! ray cast from inside a block only sees what lies beyond it.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::fragment::{BlockKey, Fragment};

/// Tolerance under which two axis crossings count as simultaneous.
const TIE_EPSILON: f32 = 1e-6;

/// First block a ray runs into.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin to `point`.
    pub distance: f32,
    /// Where the ray enters the block.
    pub point: Point3<f32>,
    /// Outward normal of the entered face. `None` when the ray enters
    /// through an edge or corner.
    pub normal: Option<Vector3<i32>>,
    /// The block's cell.
    pub block: BlockKey,
    /// The block's type.
    pub block_type: BlockType,
}

/// Casts a ray of length `max_distance` from `origin` along `direction`.
///
/// A zero `direction` never hits.
pub fn cast(
    fragment: &Fragment,
    origin: Point3<f32>,
    direction: Vector3<f32>,
    max_distance: f32,
) -> Option<RayHit> {
    if fragment.index.is_empty() {
        return None;
    }
    let length = direction.magnitude();
    if length == 0.0 || !length.is_finite() {
        return None;
    }
    let dir = direction / length;

    // Shift so cell boundaries fall on integers.
    let shifted = [origin.x + 0.5, origin.y + 0.5, origin.z + 0.5];
    let dirs = [dir.x, dir.y, dir.z];
    let mut cell = shifted.map(|v| v.floor() as i32);
    let mut step = [0i32; 3];
    let mut t_max = [f32::INFINITY; 3];
    let mut t_delta = [f32::INFINITY; 3];
    for axis in 0..3 {
        let d = dirs[axis];
        if d > 0.0 {
            step[axis] = 1;
            t_max[axis] = (cell[axis] as f32 + 1.0 - shifted[axis]) / d;
            t_delta[axis] = 1.0 / d;
        } else if d < 0.0 {
            step[axis] = -1;
            t_max[axis] = (shifted[axis] - cell[axis] as f32) / -d;
            t_delta[axis] = -1.0 / d;
        }
    }

    loop {
        let t = t_max[0].min(t_max[1]).min(t_max[2]);
        if !t.is_finite() || t > max_distance {
            return None;
        }

        let mut crossed = 0;
        let mut normal = Vector3::new(0, 0, 0);
        for axis in 0..3 {
            if t_max[axis] - t <= TIE_EPSILON {
                cell[axis] += step[axis];
                t_max[axis] += t_delta[axis];
                normal[axis] = -step[axis];
                crossed += 1;
            }
        }

        let block = BlockKey::new(cell[0], cell[1], cell[2]);
        if let Some(block_type) = fragment.block_at(block) {
            return Some(RayHit {
                distance: t,
                point: origin + dir * t,
                normal: (crossed == 1).then_some(normal),
                block,
                block_type,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::fragment::InstanceSlot;

    fn fragment_with(blocks: &[(i32, i32, i32)]) -> Fragment {
        let mut fragment = Fragment::empty(0, 0, 0);
        for (i, &(x, y, z)) in blocks.iter().enumerate() {
            fragment.index.insert(
                BlockKey::new(x, y, z),
                InstanceSlot {
                    temporary: false,
                    instance_index: i,
                    type_index: 0,
                    block_type: BlockType::STONE,
                },
            );
        }
        fragment
    }

    #[test]
    fn hits_the_near_face() {
        let fragment = fragment_with(&[(3, 0, 0)]);
        let hit = cast(&fragment, Point3::new(0.0, 0.0, 0.0), Vector3::new(5.0, 0.0, 0.0), 5.1).unwrap();
        assert_eq!(hit.block, BlockKey::new(3, 0, 0));
        assert!((hit.distance - 2.5).abs() < 1e-5);
        assert!((hit.point.x - 2.5).abs() < 1e-5);
        assert_eq!(hit.normal, Some(Vector3::new(-1, 0, 0)));
    }

    #[test]
    fn respects_the_length() {
        let fragment = fragment_with(&[(3, 0, 0)]);
        assert!(cast(&fragment, Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 2.4).is_none());
        assert!(cast(&fragment, Point3::new(0.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0), 9.0).is_none());
        assert!(cast(&fragment, Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0), 9.0).is_none());
    }

    #[test]
    fn ignores_the_starting_cell() {
        let fragment = fragment_with(&[(0, 0, 0), (0, -2, 0)]);
        let hit = cast(&fragment, Point3::new(0.1, 0.2, 0.0), Vector3::new(0.0, -1.0, 0.0), 4.0).unwrap();
        assert_eq!(hit.block, BlockKey::new(0, -2, 0));
        assert_eq!(hit.normal, Some(Vector3::new(0, 1, 0)));
        assert!((hit.point.y + 1.5).abs() < 1e-5);
    }

    #[test]
    fn diagonal_travel_reaches_off_axis_blocks() {
        let fragment = fragment_with(&[(2, 0, 1)]);
        let hit = cast(&fragment, Point3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 1.2), 4.0).unwrap();
        assert_eq!(hit.block, BlockKey::new(2, 0, 1));
        assert!(hit.normal.is_some());
    }
}
