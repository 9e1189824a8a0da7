//! # Collision Engine
//!
//! Answers "what is in the way" for block targeting and player movement.
//!
//! Every query builds its own small, collision-only fragment around the player
//! with the same synthesizer the streamed world uses, casts rays against it and
//! drops it. Nothing is cached, so a query always agrees with the seeds and the
//! current edit log even where the streamed grid is still generating.
//!
//! ## Movement probes
//!
//! The player's body is approximated by eight corner points plus the eye:
//!
//! ```text
//!   7_____________6
//!   /|           /|
//!  /_|__________/ |
//! 3| |         2| |
//!  | | *    *   | |      8 = eye
//!  | |          | |
//!  |4|__________|_|5
//!  |/___________|/
//!  0            1
//! ```
//!
//! Only the points leading in the direction of travel can hit anything first,
//! so [`PROBE_TABLE`] selects them by the sign of each movement axis.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::engine_state::camera_state::camera::{Camera, MoveIntent};
use crate::engine_state::settings::{BodyDimensions, GenerationContext, WorldSettings};
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::edit_log::EditLog;
use crate::engine_state::voxels::fragment::synthesis::{synthesize, Region};
use crate::engine_state::voxels::fragment::{BlockKey, Fragment};
use crate::engine_state::voxels::noise::NoiseSource;

pub mod raycast;

/// Rays are cast this much past the requested length.
pub const RAY_MARGIN: f32 = 0.1;

/// Probe points to test, indexed `[forward/none/back][left/none/right][down/none/up]`.
#[rustfmt::skip]
pub const PROBE_TABLE: [[[&[usize]; 3]; 3]; 3] = [
    [
        [&[8, 1, 2, 3, 4, 5, 6, 0], &[8, 1, 2, 3, 5, 6, 0], &[8, 1, 2, 3, 5, 6, 7, 0]],
        [&[8, 1, 2, 3, 4, 5, 0],    &[8, 1, 2, 3, 0],       &[8, 1, 2, 3, 6, 7, 0]],
        [&[8, 1, 2, 3, 4, 5, 7, 0], &[8, 1, 2, 3, 4, 7, 0], &[8, 1, 2, 3, 4, 6, 7, 0]],
    ],
    [
        [&[8, 1, 2, 4, 5, 6, 0],    &[8, 1, 2, 5, 6],       &[8, 1, 2, 3, 5, 6, 7]],
        [&[8, 1, 4, 5, 0],          &[],                    &[8, 2, 3, 6, 7]],
        [&[8, 1, 3, 4, 5, 7, 0],    &[8, 0, 3, 4, 7],       &[8, 2, 3, 4, 6, 7, 0]],
    ],
    [
        [&[8, 1, 2, 4, 5, 6, 7, 0], &[8, 1, 2, 4, 5, 6, 7], &[8, 1, 2, 3, 4, 5, 6, 7]],
        [&[8, 1, 4, 5, 6, 7, 0],    &[8, 4, 5, 6, 7],       &[8, 2, 3, 4, 5, 6, 7]],
        [&[8, 1, 3, 4, 5, 6, 7, 0], &[8, 3, 4, 5, 6, 7, 0], &[8, 2, 3, 4, 5, 6, 7, 0]],
    ],
];

/// Offset of probe point `index` from the eye, in camera space.
pub fn probe_offset(index: usize, body: &BodyDimensions) -> Vector3<f32> {
    let right = body.eye_right;
    let left = -body.eye_left;
    let up = body.eye_up;
    let down = -body.eye_bottom;
    let front = -body.eye_front;
    let back = body.eye_back;
    match index {
        0 => Vector3::new(right, down, front),
        1 => Vector3::new(left, down, front),
        2 => Vector3::new(left, up, front),
        3 => Vector3::new(right, up, front),
        4 => Vector3::new(right, down, back),
        5 => Vector3::new(left, down, back),
        6 => Vector3::new(left, up, back),
        7 => Vector3::new(right, up, back),
        _ => Vector3::new(0.0, 0.0, 0.0),
    }
}

/// Probe points relevant to a movement in camera space.
pub fn probes_for(relative: Vector3<f32>) -> &'static [usize] {
    let slot = |v: f32| (sign(v) + 1) as usize;
    PROBE_TABLE[slot(relative.z)][slot(relative.x)][slot(relative.y)]
}

fn sign(v: f32) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// A collision found by one of the checks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CollisionHit {
    /// Distance along the ray.
    pub distance: f32,
    /// Where the ray enters the block.
    pub point: Point3<f32>,
    /// Outward normal of the entered face, if a single face was crossed.
    pub normal: Option<Vector3<i32>>,
    /// The block's cell.
    pub block: BlockKey,
    /// The block's type.
    pub block_type: BlockType,
    /// Position the caller cares about: the hit point for plain checks, a
    /// point inside the targeted cell for targeting, the eye position at
    /// contact for movement checks.
    pub position: Point3<f32>,
}

/// What a collision query synthesizes its fragment from.
#[derive(Copy, Clone)]
pub struct CollisionScene<'a> {
    /// Settings of the running world.
    pub context: &'a GenerationContext,
    /// The world's noise source.
    pub noise: &'a dyn NoiseSource,
}

impl CollisionScene<'_> {
    /// Synthesizes the throwaway fragment covering `region`.
    pub fn bounding_fragment(&self, region: Region, access: bool, log: &mut EditLog) -> Fragment {
        let edits = log.query_area(region.stx, region.edx - 1, region.stz, region.edz - 1);
        synthesize(region, self.context, access, &edits, self.noise, 0)
    }
}

/// Block region spanning `[low, high]` around `origin`, widened to whole cells.
fn region_around(origin: Point3<f32>, low: Vector3<f32>, high: Vector3<f32>) -> Region {
    let start = |v: f32| v.floor() as i32;
    let end = |v: f32| v.ceil() as i32;
    Region {
        stx: start(origin.x - low.x),
        edx: end(origin.x + high.x),
        stz: start(origin.z - low.z),
        edz: end(origin.z + high.z),
        sty: start(origin.y - low.y),
        edy: end(origin.y + high.y),
    }
}

/// Casts a ray of length `|direction|` from `origin`.
///
/// Without a `fragment`, one padded by 3 blocks plus the ray length on every
/// side is synthesized for the call and dropped afterwards.
pub fn collision_check(
    scene: &CollisionScene<'_>,
    log: &mut EditLog,
    origin: Point3<f32>,
    direction: Vector3<f32>,
    fragment: Option<&Fragment>,
    access: bool,
) -> Option<CollisionHit> {
    let length = direction.magnitude();
    let owned;
    let fragment = match fragment {
        Some(fragment) => fragment,
        None => {
            let pad = 3.0 + length.ceil();
            let pad = Vector3::new(pad, pad, pad);
            owned = scene.bounding_fragment(region_around(origin, pad, pad), access, log);
            &owned
        }
    };

    let hit = raycast::cast(fragment, origin, direction, length + RAY_MARGIN)?;
    Some(CollisionHit {
        distance: hit.distance,
        point: hit.point,
        normal: hit.normal,
        block: hit.block,
        block_type: hit.block_type,
        position: hit.point,
    })
}

/// Targeting ray from the camera along a camera-relative direction.
///
/// On a hit, `position` is moved half a block back through the hit face, so
/// rounding it gives the targeted cell.
pub fn relative_operate_collision_check(
    scene: &CollisionScene<'_>,
    log: &mut EditLog,
    camera: &Camera,
    intent: MoveIntent,
    access: bool,
) -> Option<CollisionHit> {
    let absolute = camera.relative_to_world(intent);
    let reach = absolute.magnitude().ceil();
    let toward = |d: f32, positive: bool| {
        if (positive && d > 0.0) || (!positive && d < 0.0) {
            reach
        } else {
            3.0
        }
    };
    let low = Vector3::new(
        toward(absolute.x, false),
        toward(absolute.y, false),
        toward(absolute.z, false),
    );
    let high = Vector3::new(
        toward(absolute.x, true),
        toward(absolute.y, true),
        toward(absolute.z, true),
    );
    let fragment = scene.bounding_fragment(region_around(camera.position, low, high), access, log);

    let mut hit = collision_check(scene, log, camera.position, absolute, Some(&fragment), access)?;
    hit.position = match hit.normal {
        Some(normal) => {
            hit.point
                - Vector3::new(normal.x as f32, normal.y as f32, normal.z as f32) * 0.5
        }
        None => hit.block.center(),
    };
    Some(hit)
}

/// World-space displacement of one movement step, yaw only.
///
/// Horizontal input is scaled by the walking speed and vertical input by the
/// jump speed, both times `dt` seconds; `cheat` applies the cheat factor.
pub fn movement_vector(
    camera: &Camera,
    intent: MoveIntent,
    dt: f32,
    settings: &WorldSettings,
    cheat: bool,
) -> Vector3<f32> {
    let actions = settings.actions;
    let boost = if cheat { actions.cheat_factor } else { 1.0 };
    let scale_xz = boost * actions.walking * actions.move_scale * settings.op_sens * dt;
    let scale_y = boost * actions.jump * actions.move_scale * dt;
    let absolute = camera.horizontal_to_world(intent);
    Vector3::new(absolute.x * scale_xz, absolute.y * scale_y, absolute.z * scale_xz)
}

/// Where one unobstructed movement step would take the eye.
pub fn target_position(
    camera: &Camera,
    intent: MoveIntent,
    dt: f32,
    settings: &WorldSettings,
) -> Point3<f32> {
    camera.position + movement_vector(camera, intent, dt, settings, settings.cheat)
}

/// Per-axis movement collisions of the player's body.
///
/// Each probe point selected by the direction of travel casts one ray per
/// axis against a shared collision fragment. The nearest hit per axis is
/// kept, so a blocked axis never stops the other two.
///
/// # Returns
/// `[x, y, z]` nearest hits; `position` is the eye position at contact.
pub fn relative_collision_check_all(
    scene: &CollisionScene<'_>,
    log: &mut EditLog,
    camera: &Camera,
    intent: MoveIntent,
    dt: f32,
    settings: &WorldSettings,
) -> [Option<CollisionHit>; 3] {
    let absolute = movement_vector(camera, intent, dt, settings, false);
    let max_move = absolute.magnitude().ceil();
    let pad = Vector3::new(3.0 + max_move, 5.0 + max_move, 3.0 + max_move);
    let fragment = scene.bounding_fragment(region_around(camera.position, pad, pad), true, log);

    let mut nearest: [Option<CollisionHit>; 3] = [None; 3];
    for &probe in probes_for(intent.camera_vector()) {
        let inner = camera.horizontal_rotation() * probe_offset(probe, &settings.body);
        let from = camera.position + inner;
        for axis in 0..3 {
            let mut direction = Vector3::new(0.0, 0.0, 0.0);
            direction[axis] = absolute[axis];
            let Some(mut hit) = collision_check(scene, log, from, direction, Some(&fragment), true)
            else {
                continue;
            };
            if nearest[axis].is_some_and(|best| best.distance <= hit.distance) {
                continue;
            }
            hit.position[axis] -= inner[axis];
            nearest[axis] = Some(hit);
        }
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_table_matches_the_body_corners() {
        let body = BodyDimensions::default();
        // Standing still needs nothing.
        assert!(probes_for(Vector3::new(0.0, 0.0, 0.0)).is_empty());
        // Pure forward motion only needs the front face and the eye.
        let front = probes_for(Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(front, &[8, 1, 2, 3, 0]);
        assert!(front
            .iter()
            .filter(|&&p| p != 8)
            .all(|&p| probe_offset(p, &body).z < 0.0));
        // Falling only needs the feet.
        let down = probes_for(Vector3::new(0.0, -1.0, 0.0));
        assert!(down
            .iter()
            .filter(|&&p| p != 8)
            .all(|&p| probe_offset(p, &body).y < 0.0));
        // Every selection is drawn from the nine probes.
        for plane in PROBE_TABLE.iter() {
            for row in plane.iter() {
                for probes in row.iter() {
                    assert!(probes.iter().all(|&p| p <= 8));
                }
            }
        }
    }

    #[test]
    fn region_covers_the_padding() {
        let region = region_around(
            Point3::new(0.5, 10.2, -0.5),
            Vector3::new(3.0, 5.0, 3.0),
            Vector3::new(4.0, 5.0, 4.0),
        );
        assert_eq!((region.stx, region.edx), (-3, 5));
        assert_eq!((region.sty, region.edy), (5, 16));
        assert_eq!((region.stz, region.edz), (-4, 4));
    }
}
