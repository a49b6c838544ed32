//! Perspective camera, orbit controls and model framing.
//!
//! ```text
//! camera/
//! ├── framer.rs: fit the camera to a model's bounding volume
//! └── orbit.rs : orbit controls (auto-rotate, rotate / zoom input, reset)
//! ```

pub mod framer;
pub mod orbit;

pub use framer::{compute_framing, frame, Framing};
pub use orbit::{OrbitControls, OrbitInput};

use glam::{Mat4, Vec3};
use serde::Serialize;

use crate::config::CameraConfig;

/// Perspective camera parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Configured near plane; framing may pull `near` closer for small
    /// models but never pushes it past this value.
    pub default_near: f32,
}

impl CameraState {
    pub fn new(config: &CameraConfig, up: Vec3) -> Self {
        Self {
            position: Vec3::from_array(config.position),
            up,
            fov_deg: config.fov_deg,
            aspect: 1.0,
            near: config.near,
            far: config.far,
            default_near: config.near,
        }
    }

    /// Update the aspect ratio from viewport dimensions. A zero-height
    /// viewport (minimised window) is ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height == 0 || width == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view(&self, target: Vec3) -> Mat4 {
        Mat4::look_at_rh(self.position, target, self.up)
    }
}

/// Serializable camera snapshot for the renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub max_distance: f32,
    pub auto_rotate: bool,
    /// Column-major view matrix.
    pub view: [f32; 16],
    /// Column-major projection matrix.
    pub projection: [f32; 16],
}

impl CameraView {
    pub fn capture(camera: &CameraState, controls: &OrbitControls) -> Self {
        Self {
            position: camera.position.to_array(),
            target: controls.target.to_array(),
            up: camera.up.to_array(),
            fov_deg: camera.fov_deg,
            aspect: camera.aspect,
            near: camera.near,
            far: camera.far,
            max_distance: controls.max_distance,
            auto_rotate: controls.auto_rotate,
            view: camera.view(controls.target).to_cols_array(),
            projection: camera.projection().to_cols_array(),
        }
    }
}
