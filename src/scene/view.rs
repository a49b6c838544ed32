//! Flattened scene snapshot sent to the webview renderer.
//!
//! Buffers are flat `f32` / `u32` arrays (three floats per vertex) so the
//! frontend can hand them straight to `BufferGeometry` attributes.

use base64::Engine as _;
use glam::Mat4;
use serde::Serialize;
use uuid::Uuid;

use super::{Light, Scene};

/// One drawable mesh with its world transform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshView {
    pub node_id: Uuid,
    pub name: String,
    /// Column-major world matrix.
    pub world: [f32; 16],
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    pub color: [f32; 4],
    /// `data:image/png;base64,…` URI of the diffuse texture.
    pub texture: Option<String>,
}

/// Everything the renderer needs to draw the current scene.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneView {
    pub background: [f32; 3],
    pub lights: Vec<Light>,
    pub meshes: Vec<MeshView>,
}

impl From<&Scene> for SceneView {
    fn from(scene: &Scene) -> Self {
        let mut meshes = Vec::new();
        for model in &scene.models {
            model.visit(Mat4::IDENTITY, &mut |node, world| {
                let Some(mesh) = &node.mesh else {
                    return;
                };
                let material = mesh.material.as_deref();
                meshes.push(MeshView {
                    node_id: node.id,
                    name: node.name.clone(),
                    world: world.to_cols_array(),
                    vertices: mesh.positions.iter().flat_map(|p| p.to_array()).collect(),
                    normals: mesh
                        .normals
                        .iter()
                        .flatten()
                        .flat_map(|n| n.to_array())
                        .collect(),
                    uvs: mesh.uvs.iter().flatten().flat_map(|t| t.to_array()).collect(),
                    indices: mesh.indices.clone().unwrap_or_default(),
                    color: material.map_or([1.0, 1.0, 1.0, 1.0], |m| m.color),
                    texture: material.and_then(|m| m.map.as_ref()).map(|t| {
                        format!(
                            "data:image/png;base64,{}",
                            base64::engine::general_purpose::STANDARD.encode(&t.png)
                        )
                    }),
                });
            });
        }
        Self {
            background: scene.background,
            lights: scene.lights.clone(),
            meshes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::*;
    use crate::scene::{Material, Mesh, SceneNode, Texture};

    #[test]
    fn empty_scene_has_no_meshes() {
        let view = SceneView::from(&Scene::default());
        assert!(view.meshes.is_empty());
        assert_eq!(view.lights.len(), 2);
    }

    #[test]
    fn meshes_are_flattened_with_world_transform_and_material() {
        let material = Arc::new(Material {
            name: "red".into(),
            color: [1.0, 0.0, 0.0, 1.0],
            map: Some(Arc::new(Texture {
                source: "red.png".into(),
                width: 1,
                height: 1,
                png: vec![1, 2, 3],
            })),
        });
        let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with_indices(vec![0, 1, 2])
            .with_material(material);
        let mut root = SceneNode::group("root")
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)));
        root.add_child(SceneNode::with_mesh("tri", mesh));

        let mut scene = Scene::default();
        scene.replace_model(root);
        let view = SceneView::from(&scene);

        assert_eq!(view.meshes.len(), 1);
        let m = &view.meshes[0];
        assert_eq!(m.name, "tri");
        assert_eq!(m.vertices, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(m.normals.is_empty());
        assert_eq!(m.indices, vec![0, 1, 2]);
        assert_eq!(m.world[14], 5.0);
        assert_eq!(m.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(m.texture.as_deref(), Some("data:image/png;base64,AQID"));

        let json = serde_json::to_value(&view).expect("serialize");
        assert!(json["meshes"][0]["nodeId"].is_string());
    }
}
