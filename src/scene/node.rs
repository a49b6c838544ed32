//! Scene graph nodes, meshes and materials produced by the loaders.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use uuid::Uuid;

/// Decoded texture, kept PNG-encoded so the renderer and the exporter can
/// share one copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// File name the material referenced (e.g. `"wood.tga"`).
    pub source: String,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded RGBA8 pixels.
    pub png: Vec<u8>,
}

/// Surface description shared by one or more meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA base colour.
    pub color: [f32; 4],
    /// Diffuse / base-colour texture.
    pub map: Option<Arc<Texture>>,
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: [1.0, 1.0, 1.0, 1.0],
            map: None,
        }
    }
}

/// Triangle geometry in the node's local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    /// One normal per position; `None` until a loader or the normal repair
    /// pass fills it in.
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
    /// Triangle list indices; `None` means every three positions form a
    /// triangle.
    pub indices: Option<Vec<u32>>,
    pub material: Option<Arc<Material>>,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|n| !n.is_empty() && n.len() == self.positions.len())
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }
}

/// Deepest node hierarchy a loader may produce. The recursive walks below
/// rely on every loader enforcing it.
pub const MAX_NODE_DEPTH: usize = 256;

/// A node in the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Stable identifier the renderer uses to address this node.
    pub id: Uuid,
    pub name: String,
    /// Local transform relative to the parent node.
    pub transform: Mat4,
    pub mesh: Option<Mesh>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Empty group node with an identity transform.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            transform: Mat4::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }

    /// Leaf node carrying `mesh`.
    pub fn with_mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::group(name)
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Visit every node depth-first with its world transform, given the
    /// world transform of this node's parent.
    pub fn visit<'a>(&'a self, parent_world: Mat4, f: &mut dyn FnMut(&'a SceneNode, Mat4)) {
        let world = parent_world * self.transform;
        f(self, world);
        for child in &self.children {
            child.visit(world, f);
        }
    }

    /// Visit every mesh in this subtree mutably.
    pub fn traverse_meshes_mut(&mut self, f: &mut dyn FnMut(&mut Mesh)) {
        if let Some(mesh) = self.mesh.as_mut() {
            f(mesh);
        }
        for child in &mut self.children {
            child.traverse_meshes_mut(f);
        }
    }

    /// Number of meshes in this subtree.
    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(Mat4::IDENTITY, &mut |node, _| {
            if node.mesh.is_some() {
                count += 1;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
    }

    #[test]
    fn group_nodes_get_unique_ids() {
        let a = SceneNode::group("a");
        let b = SceneNode::group("a");
        assert_ne!(a.id, b.id);
        assert_eq!(a.transform, Mat4::IDENTITY);
    }

    #[test]
    fn visit_composes_parent_transforms() {
        let mut root = SceneNode::group("root")
            .with_transform(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        root.add_child(
            SceneNode::with_mesh("leaf", triangle())
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0))),
        );

        let mut leaf_world = None;
        root.visit(Mat4::IDENTITY, &mut |node, world| {
            if node.name == "leaf" {
                leaf_world = Some(world);
            }
        });
        let origin = leaf_world.expect("leaf visited").transform_point3(Vec3::ZERO);
        assert_eq!(origin, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn mesh_count_includes_nested_meshes() {
        let mut root = SceneNode::with_mesh("root", triangle());
        let mut group = SceneNode::group("group");
        group.add_child(SceneNode::with_mesh("a", triangle()));
        group.add_child(SceneNode::with_mesh("b", triangle()));
        root.add_child(group);
        assert_eq!(root.mesh_count(), 3);
    }

    #[test]
    fn has_normals_requires_one_per_position() {
        let mut mesh = triangle();
        assert!(!mesh.has_normals());
        mesh.normals = Some(vec![Vec3::Z]);
        assert!(!mesh.has_normals());
        mesh.normals = Some(vec![Vec3::Z; 3]);
        assert!(mesh.has_normals());
    }

    #[test]
    fn triangle_count_handles_indexed_and_flat_meshes() {
        assert_eq!(triangle().triangle_count(), 1);
        let quad = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE])
            .with_indices(vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(quad.triangle_count(), 2);
    }
}
