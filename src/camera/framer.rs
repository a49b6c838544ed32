//! Fit a perspective camera to a freshly loaded model.
//!
//! The distance heuristic, `|max_dim / 4 · tan(2 · fov)| · margin`, is not a
//! tight geometric fit; it overestimates on purpose so the model does not
//! fill the viewport edge to edge. The far plane and the orbit zoom limit
//! are derived from the distance between the camera and the far side of the
//! bounding box, so orbiting never clips the back of the model.

use glam::Vec3;
use serde::Serialize;

use super::{CameraState, OrbitControls};
use crate::config::FramingConfig;
use crate::scene::{Aabb, SceneNode};

/// Near plane is never further than this fraction of the far plane.
const NEAR_FAR_RATIO: f32 = 0.01;

/// Result of fitting the camera to one bounding volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Framing {
    pub bounds: Aabb,
    pub center: Vec3,
    /// Camera distance from `center` along the view axis.
    pub distance: f32,
    /// Depth from the camera to the far face of the bounds.
    pub far_edge: f32,
    pub near: f32,
    pub far: f32,
    pub max_orbit_distance: f32,
    /// `true` when the bounds had no volume and the distance floor applied.
    pub degenerate: bool,
}

/// Pure framing computation for `bounds` seen through a `fov_deg` camera.
pub fn compute_framing(
    bounds: &Aabb,
    fov_deg: f32,
    default_near: f32,
    cfg: &FramingConfig,
) -> Framing {
    let center = bounds.center();
    let max_dim = bounds.size().max_element();
    let fov = fov_deg.to_radians();

    let mut distance = (max_dim / 4.0 * (fov * 2.0).tan()).abs() * cfg.margin;

    let degenerate = bounds.is_empty()
        || max_dim <= f32::EPSILON
        || !distance.is_finite()
        || distance <= f32::EPSILON;
    if degenerate {
        distance = cfg.min_distance.max(max_dim);
    }

    let axis = cfg.up_axis.view_axis();
    let center_depth = center.dot(axis);
    let camera_depth = center_depth + distance;
    let far_depth = if bounds.is_empty() {
        center_depth
    } else {
        bounds
            .corners()
            .iter()
            .map(|c| c.dot(axis))
            .fold(f32::INFINITY, f32::min)
    };
    let far_edge = (camera_depth - far_depth).abs();

    let far = far_edge * cfg.far_multiplier;
    Framing {
        bounds: *bounds,
        center,
        distance,
        far_edge,
        near: default_near.min(far * NEAR_FAR_RATIO),
        far,
        max_orbit_distance: far_edge * cfg.orbit_distance_multiplier,
        degenerate,
    }
}

/// Point `camera` and `controls` at `model`.
///
/// Places the camera on the configured view axis, updates the clip planes,
/// targets the controls at the model centre, caps zoom-out at the
/// clip-safe distance, enables auto-rotate and saves the result as the
/// controls' reset baseline.
pub fn frame(
    camera: &mut CameraState,
    controls: &mut OrbitControls,
    model: &SceneNode,
    cfg: &FramingConfig,
) -> Framing {
    let bounds = Aabb::from_node(model);
    let framing = compute_framing(&bounds, camera.fov_deg, camera.default_near, cfg);

    if framing.degenerate {
        tracing::warn!(
            model = %model.name,
            distance = framing.distance,
            "model has no volume; using minimum camera distance"
        );
    }

    camera.up = cfg.up_axis.up();
    camera.position = framing.center + cfg.up_axis.view_axis() * framing.distance;
    camera.near = framing.near;
    camera.far = framing.far;

    controls.target = framing.center;
    controls.max_distance = framing.max_orbit_distance;
    controls.auto_rotate = true;
    controls.save_state(camera);

    tracing::debug!(
        center = ?framing.center,
        distance = framing.distance,
        far = framing.far,
        "framed camera"
    );
    framing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, UpAxis};
    use crate::scene::Mesh;

    fn unit_cube() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn cube_at_sixty_degrees_has_positive_distance_and_far_beyond_it() {
        let f = compute_framing(&unit_cube(), 60.0, 1.0, &FramingConfig::default());
        assert!(f.distance > 0.0);
        assert!(f.far > f.distance);
        assert!(!f.degenerate);

        // |2 / 4 · tan(120°)| · 1.25
        let expected = (0.5 * (120.0_f32).to_radians().tan()).abs() * 1.25;
        assert!((f.distance - expected).abs() < 1e-5);
        assert!((f.far_edge - (expected + 1.0)).abs() < 1e-5);
        assert!((f.far - 3.0 * f.far_edge).abs() < 1e-5);
        assert!((f.max_orbit_distance - 2.0 * f.far_edge).abs() < 1e-5);
    }

    #[test]
    fn point_bounds_use_the_distance_floor() {
        let mut b = Aabb::EMPTY;
        b.expand(Vec3::new(3.0, 3.0, 3.0));
        let f = compute_framing(&b, 60.0, 1.0, &FramingConfig::default());
        assert!(f.degenerate);
        assert_eq!(f.distance, 1.0);
        assert!(f.far > f.distance);
        assert!(f.near > 0.0 && f.near < f.far);
        assert!(f.distance.is_finite() && f.far.is_finite());
    }

    #[test]
    fn empty_bounds_frame_the_origin() {
        let f = compute_framing(&Aabb::EMPTY, 60.0, 1.0, &FramingConfig::default());
        assert!(f.degenerate);
        assert_eq!(f.center, Vec3::ZERO);
        assert!(f.distance > 0.0);
    }

    #[test]
    fn flat_geometry_is_not_degenerate() {
        let b = Aabb::new(Vec3::new(-2.0, -2.0, 0.0), Vec3::new(2.0, 2.0, 0.0));
        let f = compute_framing(&b, 60.0, 1.0, &FramingConfig::default());
        assert!(!f.degenerate);
        assert!(f.distance > 0.0);
        assert!((f.far_edge - f.distance).abs() < 1e-5);
    }

    #[test]
    fn near_plane_shrinks_for_small_models() {
        let tiny = Aabb::new(Vec3::splat(-0.01), Vec3::splat(0.01));
        let f = compute_framing(&tiny, 60.0, 1.0, &FramingConfig::default());
        assert!(f.near < f.distance, "near {} must not clip the model", f.near);

        let huge = Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0));
        let f = compute_framing(&huge, 60.0, 1.0, &FramingConfig::default());
        assert_eq!(f.near, 1.0);
    }

    #[test]
    fn frame_positions_camera_on_view_axis_and_configures_controls() {
        let mesh = Mesh::new(vec![Vec3::new(9.0, -1.0, -1.0), Vec3::new(11.0, 1.0, 1.0)]);
        let model = SceneNode::with_mesh("cube", mesh);
        let mut camera = CameraState::new(&CameraConfig::default(), Vec3::Y);
        let mut controls = OrbitControls::default();

        let f = frame(&mut camera, &mut controls, &model, &FramingConfig::default());

        assert_eq!(f.center, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(camera.position, Vec3::new(10.0, 0.0, f.distance));
        assert_eq!(camera.far, f.far);
        assert_eq!(camera.up, Vec3::Y);
        assert_eq!(controls.target, f.center);
        assert_eq!(controls.max_distance, f.max_orbit_distance);
        assert!(controls.auto_rotate);
    }

    #[test]
    fn z_up_convention_places_camera_on_negative_y() {
        let mesh = Mesh::new(vec![Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let model = SceneNode::with_mesh("cube", mesh);
        let mut camera = CameraState::new(&CameraConfig::default(), Vec3::Y);
        let mut controls = OrbitControls::default();
        let cfg = FramingConfig {
            up_axis: UpAxis::Z,
            ..FramingConfig::default()
        };

        let f = frame(&mut camera, &mut controls, &model, &cfg);

        assert_eq!(camera.up, Vec3::Z);
        assert!((camera.position - Vec3::new(0.0, -f.distance, 0.0)).length() < 1e-6);
        assert!((f.far_edge - (f.distance + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn frame_saves_reset_baseline() {
        let mesh = Mesh::new(vec![Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let model = SceneNode::with_mesh("cube", mesh);
        let mut camera = CameraState::new(&CameraConfig::default(), Vec3::Y);
        let mut controls = OrbitControls::default();
        frame(&mut camera, &mut controls, &model, &FramingConfig::default());
        let framed = camera.position;

        controls.zoom(&mut camera, 0.5);
        assert_ne!(camera.position, framed);
        controls.reset(&mut camera);
        assert!((camera.position - framed).length() < 1e-5);
    }
}
