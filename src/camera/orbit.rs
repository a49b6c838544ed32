//! Orbit controls: rotate and zoom a camera around a fixed target.
//!
//! The camera offset from the target is expressed in spherical coordinates
//! around the camera's up vector. Input and auto-rotation only change the
//! camera position; clip planes are left to the framer.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Quat, Vec3};

use super::CameraState;
use crate::config::ControlsConfig;

/// Keeps the polar angle off the poles, where the azimuth is undefined.
const POLAR_EPSILON: f32 = 1e-6;

/// User input forwarded from the viewport.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrbitInput {
    /// Angles in radians around the up axis and towards it.
    Rotate { azimuth: f32, polar: f32 },
    /// Distance multiplier; above 1 moves away from the target.
    Zoom { scale: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SavedState {
    target: Vec3,
    position: Vec3,
}

/// Orbit control state.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub auto_rotate: bool,
    /// 2.0 is one revolution every 30 seconds.
    pub auto_rotate_speed: f32,
    saved: Option<SavedState>,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            saved: None,
        }
    }
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            min_distance: config.min_distance,
            auto_rotate_speed: config.auto_rotate_speed,
            ..Self::default()
        }
    }

    /// Advance auto-rotation by `dt` seconds and re-apply distance limits.
    pub fn update(&self, camera: &mut CameraState, dt: f32) {
        let angle = if self.auto_rotate {
            TAU / 60.0 * self.auto_rotate_speed * dt.max(0.0)
        } else {
            0.0
        };
        self.orbit(camera, -angle, 0.0, 1.0);
    }

    /// Rotate the camera around the target by the given angles (radians).
    pub fn rotate(&self, camera: &mut CameraState, azimuth: f32, polar: f32) {
        self.orbit(camera, azimuth, polar, 1.0);
    }

    /// Scale the camera's distance to the target, within the limits.
    pub fn zoom(&self, camera: &mut CameraState, scale: f32) {
        if scale.is_finite() && scale > 0.0 {
            self.orbit(camera, 0.0, 0.0, scale);
        }
    }

    pub fn apply(&self, camera: &mut CameraState, input: OrbitInput) {
        match input {
            OrbitInput::Rotate { azimuth, polar } => self.rotate(camera, azimuth, polar),
            OrbitInput::Zoom { scale } => self.zoom(camera, scale),
        }
    }

    /// Remember the current target and camera position for [`reset`](Self::reset).
    pub fn save_state(&mut self, camera: &CameraState) {
        self.saved = Some(SavedState {
            target: self.target,
            position: camera.position,
        });
    }

    /// Restore the last saved state. No-op before the first save.
    pub fn reset(&mut self, camera: &mut CameraState) {
        if let Some(saved) = self.saved {
            self.target = saved.target;
            camera.position = saved.position;
        }
    }

    fn orbit(&self, camera: &mut CameraState, d_azimuth: f32, d_polar: f32, scale: f32) {
        let up = camera.up.try_normalize().unwrap_or(Vec3::Y);
        let to_y_up = Quat::from_rotation_arc(up, Vec3::Y);

        let offset = to_y_up * (camera.position - self.target);
        let radius = offset.length();
        let (azimuth, polar) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, FRAC_PI_2)
        };

        let azimuth = azimuth + d_azimuth;
        let polar = (polar + d_polar).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        let radius =
            (radius * scale).clamp(self.min_distance, self.max_distance.max(self.min_distance));

        let offset = Vec3::new(
            radius * polar.sin() * azimuth.sin(),
            radius * polar.cos(),
            radius * polar.sin() * azimuth.cos(),
        );
        camera.position = self.target + to_y_up.inverse() * offset;
    }
}
