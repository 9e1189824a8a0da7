//! # Camera Implementation
//!
//! The player's eye: a position and a yaw/pitch orientation.
//!
//! ## Conventions
//! - Y is up; at zero yaw the camera looks along `-Z` and its right is `+X`
//! - Orientation is applied yaw first, then pitch (`YXZ` Euler order), with no roll
//! - Camera-relative input is `(front, left, up)`; in camera space that is the
//!   vector `(-left, up, -front)`

use cgmath::{Matrix3, Point3, Rad, Vector3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Pitch limit, just short of straight up or down.
pub const PITCH_LIMIT: f32 = 0.495 * PI;

/// Camera-relative movement input, each component in `[-1, 1]` for analog
/// input but unbounded for programmatic use.
///
/// # Fields
/// - `front`: positive moves forward
/// - `left`: positive moves left
/// - `up`: positive moves up
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub front: f32,
    pub left: f32,
    pub up: f32,
}

impl MoveIntent {
    pub fn new(front: f32, left: f32, up: f32) -> Self {
        MoveIntent { front, left, up }
    }

    /// The intent as a camera-space vector.
    pub fn camera_vector(&self) -> Vector3<f32> {
        Vector3::new(-self.left, self.up, -self.front)
    }

    /// Whether the intent moves at all.
    pub fn is_idle(&self) -> bool {
        self.front == 0.0 && self.left == 0.0 && self.up == 0.0
    }
}

/// View rotation input.
///
/// `horizontal` turns right when positive, `vertical` looks up when positive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewIntent {
    pub horizontal: f32,
    pub vertical: f32,
}

/// First-person camera.
///
/// # Fields
/// - `position`: the eye position in world space
/// - `yaw`: rotation around the Y axis, kept in `[-π, π]`
/// - `pitch`: rotation around the camera's X axis, kept within [`PITCH_LIMIT`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    /// Creates a camera at `position` looking along `-Z`.
    pub fn new<V: Into<Point3<f32>>>(position: V) -> Self {
        Camera {
            position: position.into(),
            yaw: Rad(0.0),
            pitch: Rad(0.0),
        }
    }

    /// Full orientation: yaw, then pitch.
    pub fn rotation(&self) -> Matrix3<f32> {
        Matrix3::from_angle_y(self.yaw) * Matrix3::from_angle_x(self.pitch)
    }

    /// Orientation with the pitch dropped.
    pub fn horizontal_rotation(&self) -> Matrix3<f32> {
        Matrix3::from_angle_y(self.yaw)
    }

    /// Direction the camera looks in.
    pub fn forward(&self) -> Vector3<f32> {
        self.rotation() * Vector3::new(0.0, 0.0, -1.0)
    }

    /// World-space direction of `intent`, following the full orientation.
    pub fn relative_to_world(&self, intent: MoveIntent) -> Vector3<f32> {
        self.rotation() * intent.camera_vector()
    }

    /// World-space direction of `intent`, following the yaw only. Walking
    /// stays level no matter where the player looks.
    pub fn horizontal_to_world(&self, intent: MoveIntent) -> Vector3<f32> {
        self.horizontal_rotation() * intent.camera_vector()
    }

    /// Turns by the given angles, wrapping yaw and clamping pitch.
    pub fn rotate(&mut self, yaw: Rad<f32>, pitch: Rad<f32>) {
        let mut new_yaw = self.yaw.0 + yaw.0;
        if new_yaw > PI {
            new_yaw -= 2.0 * PI;
        } else if new_yaw < -PI {
            new_yaw += 2.0 * PI;
        }
        self.yaw = Rad(new_yaw);
        self.pitch = Rad((self.pitch.0 + pitch.0).clamp(-PITCH_LIMIT, PITCH_LIMIT));
    }
}
