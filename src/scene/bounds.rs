//! Axis-aligned bounding volumes.

use glam::{Mat4, Vec3};
use serde::Serialize;

use super::node::SceneNode;

/// Axis-aligned box. An *empty* box has `min > max` on every axis and
/// absorbs the first point expanded into it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Extent along each axis; zero for an empty box.
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Midpoint; the origin for an empty box.
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// The eight corner points.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// World-space bounds of every vertex under `node`.
    ///
    /// Each position is transformed individually, so rotated meshes get a
    /// tight box rather than the box of their rotated local box.
    pub fn from_node(node: &SceneNode) -> Self {
        let mut bounds = Self::EMPTY;
        node.visit(Mat4::IDENTITY, &mut |n, world| {
            if let Some(mesh) = &n.mesh {
                for p in &mesh.positions {
                    bounds.expand(world.transform_point3(*p));
                }
            }
        });
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::node::Mesh;

    #[test]
    fn default_box_is_empty_with_zero_size() {
        let b = Aabb::default();
        assert!(b.is_empty());
        assert_eq!(b.size(), Vec3::ZERO);
        assert_eq!(b.center(), Vec3::ZERO);
    }

    #[test]
    fn single_point_box_is_not_empty_but_has_zero_size() {
        let mut b = Aabb::EMPTY;
        b.expand(Vec3::new(2.0, 3.0, 4.0));
        assert!(!b.is_empty());
        assert_eq!(b.size(), Vec3::ZERO);
        assert_eq!(b.center(), Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn from_node_applies_world_transforms() {
        let mesh = Mesh::new(vec![Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)]);
        let mut root = SceneNode::group("root").with_transform(Mat4::from_scale(Vec3::splat(2.0)));
        root.add_child(
            SceneNode::with_mesh("cube", mesh)
                .with_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))),
        );

        let b = Aabb::from_node(&root);
        assert_eq!(b.min, Vec3::new(18.0, -2.0, -2.0));
        assert_eq!(b.max, Vec3::new(22.0, 2.0, 2.0));
        assert_eq!(b.center(), Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn node_without_meshes_has_empty_bounds() {
        assert!(Aabb::from_node(&SceneNode::group("empty")).is_empty());
    }

    #[test]
    fn corners_span_min_and_max() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let corners = b.corners();
        assert!(corners.contains(&Vec3::ZERO));
        assert!(corners.contains(&Vec3::ONE));
        assert!(corners.contains(&Vec3::new(1.0, 0.0, 1.0)));
    }
}
