//! # Camera State Management
//!
//! Turns per-frame player input into camera motion.
//!
//! ## Core Components
//! - `Camera`: the eye position and yaw/pitch orientation
//! - `MovementController`: gravity, jumping and collision-aware walking
//!
//! ## Movement
//! Outside cheat mode the vertical input is replaced by the jump state: a jump
//! starts only from the ground, every update subtracts gravity from the
//! vertical speed, and landing (or bumping the head) resets it. Each axis of
//! the step is applied only if no probe of the body collides along it, which
//! lets the player slide along walls.
//!
//! In cheat mode the player flies straight to the target without collisions.

use cgmath::Rad;
use log::trace;

use crate::engine_state::collision::{relative_collision_check_all, target_position, CollisionScene};
use crate::engine_state::settings::WorldSettings;
use crate::engine_state::voxels::edit_log::EditLog;

pub mod camera;

use camera::{Camera, MoveIntent, ViewIntent};

/// Jump and fall state of the player.
///
/// # Fields
/// - `jumping`: whether the player is airborne
/// - `jumping_speed`: current vertical speed, in units of the jump scale
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MovementController {
    pub jumping: bool,
    pub jumping_speed: f32,
}

impl Default for MovementController {
    /// A new player starts airborne so it settles onto the ground.
    fn default() -> Self {
        MovementController {
            jumping: true,
            jumping_speed: 0.0,
        }
    }
}

impl MovementController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertical input for this update, advancing the jump state.
    fn vertical_input(&mut self, up: f32, gravity: f32) -> f32 {
        if !self.jumping && up > 0.0 {
            self.jumping = true;
            self.jumping_speed = up;
        }
        self.jumping_speed -= gravity;
        self.jumping_speed + gravity / 2.0
    }

    /// Moves `camera` by one step of `intent` over `dt` seconds.
    ///
    /// # Returns
    /// Per axis, whether the step was blocked.
    pub fn position_move(
        &mut self,
        camera: &mut Camera,
        intent: MoveIntent,
        dt: f32,
        settings: &WorldSettings,
        scene: &CollisionScene<'_>,
        log: &mut EditLog,
    ) -> [bool; 3] {
        if settings.cheat {
            camera.position = target_position(camera, intent, dt, settings);
            return [false; 3];
        }

        let gravity = settings.actions.gravity;
        let intent = MoveIntent {
            up: self.vertical_input(intent.up, gravity),
            ..intent
        };
        let target = target_position(camera, intent, dt, settings);
        let hits = relative_collision_check_all(scene, log, camera, intent, dt, settings);

        let mut blocked = [false; 3];
        for axis in 0..3 {
            match hits[axis] {
                None => camera.position[axis] = target[axis],
                Some(hit) => {
                    trace!("Movement blocked on axis {} by {:?}", axis, hit.block);
                    blocked[axis] = true;
                }
            }
        }
        if blocked[1] {
            if self.jumping_speed < 0.0 {
                self.jumping = false;
            }
            self.jumping_speed = 0.0;
        }
        blocked
    }

    /// Turns `camera` by `view` over `dt` seconds.
    pub fn view_direction_move(
        &self,
        camera: &mut Camera,
        view: ViewIntent,
        dt: f32,
        settings: &WorldSettings,
    ) {
        let scale = settings.actions.view_scale * dt;
        camera.rotate(
            Rad(-view.horizontal * scale * settings.op_sens),
            Rad(view.vertical * scale),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumps_start_only_from_the_ground() {
        let mut controller = MovementController::new();
        // Airborne: the jump input is ignored.
        let up = controller.vertical_input(1.0, 0.1);
        assert!((up + 0.05).abs() < 1e-6);
        assert!((controller.jumping_speed + 0.1).abs() < 1e-6);

        controller.jumping = false;
        controller.jumping_speed = 0.0;
        let up = controller.vertical_input(1.0, 0.1);
        assert!(controller.jumping);
        assert!((controller.jumping_speed - 0.9).abs() < 1e-6);
        assert!((up - 0.95).abs() < 1e-6);
    }

    #[test]
    fn view_turns_with_sensitivity() {
        let controller = MovementController::new();
        let mut camera = Camera::new(cgmath::Point3::new(0.0, 0.0, 0.0));
        let settings = WorldSettings {
            op_sens: 2.0,
            ..WorldSettings::default()
        };
        let view = ViewIntent {
            horizontal: 1.0,
            vertical: 1.0,
        };
        controller.view_direction_move(&mut camera, view, 0.5, &settings);
        assert!((camera.yaw.0 + 0.5).abs() < 1e-6);
        assert!((camera.pitch.0 - 0.25).abs() < 1e-6);
    }
}
