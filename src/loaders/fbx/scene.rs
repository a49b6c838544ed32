//! Object graph → scene graph.
//!
//! FBX stores geometry, models and materials as flat `Objects` records
//! linked by `Connections`. Models connected to the root (id 0) become the
//! top-level children; geometry and materials hang off their models.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::scene::{Material, Mesh, SceneNode, MAX_NODE_DEPTH};

use super::reader::{FbxDocument, FbxNode, Property};

#[derive(Debug, Default)]
struct ModelRecord {
    name: String,
    transform: Mat4,
    geometries: Vec<i64>,
    materials: Vec<i64>,
    children: Vec<i64>,
}

/// Build the scene rooted at a group named `root_name`.
pub fn build_scene(document: &FbxDocument, root_name: &str) -> Result<SceneNode, String> {
    let mut geometries: HashMap<i64, Mesh> = HashMap::new();
    let mut materials: HashMap<i64, Arc<Material>> = HashMap::new();
    let mut models: HashMap<i64, ModelRecord> = HashMap::new();
    let mut model_order = Vec::new();

    if let Some(objects) = document.node("Objects") {
        for object in &objects.children {
            let Some(id) = object.property(0).and_then(Property::as_i64) else {
                continue;
            };
            match object.name.as_str() {
                "Geometry" if object_class(object) == Some("Mesh") => {
                    geometries.insert(id, read_geometry(object)?);
                }
                "Model" => {
                    models.insert(
                        id,
                        ModelRecord {
                            name: object_name(object),
                            transform: local_transform(object),
                            ..ModelRecord::default()
                        },
                    );
                    model_order.push(id);
                }
                "Material" => {
                    materials.insert(id, Arc::new(read_material(object)));
                }
                _ => {}
            }
        }
    }

    let mut parented = HashSet::new();
    if let Some(connections) = document.node("Connections") {
        for connection in connections.children_named("C") {
            let (Some(child), Some(parent)) = (
                connection.property(1).and_then(Property::as_i64),
                connection.property(2).and_then(Property::as_i64),
            ) else {
                continue;
            };
            let Some(model) = models.get_mut(&parent) else {
                continue;
            };
            if geometries.contains_key(&child) {
                model.geometries.push(child);
            } else if materials.contains_key(&child) {
                model.materials.push(child);
            } else if child != parent && model_order.contains(&child) {
                model.children.push(child);
                parented.insert(child);
            }
        }
    }

    let mut root = SceneNode::group(root_name);
    let objects = Objects {
        models: &models,
        geometries: &geometries,
        materials: &materials,
    };
    let mut visited = HashSet::new();
    for id in model_order.iter().filter(|id| !parented.contains(*id)) {
        if let Some(node) = objects.build_model(*id, &mut visited, 0)? {
            root.add_child(node);
        }
    }
    Ok(root)
}

struct Objects<'a> {
    models: &'a HashMap<i64, ModelRecord>,
    geometries: &'a HashMap<i64, Mesh>,
    materials: &'a HashMap<i64, Arc<Material>>,
}

impl Objects<'_> {
    /// Build model `id` and its descendants. A model reached twice is
    /// skipped, which breaks connection cycles.
    fn build_model(
        &self,
        id: i64,
        visited: &mut HashSet<i64>,
        depth: usize,
    ) -> Result<Option<SceneNode>, String> {
        if depth >= MAX_NODE_DEPTH {
            return Err(format!("model hierarchy is deeper than {MAX_NODE_DEPTH} levels"));
        }
        if !visited.insert(id) {
            return Ok(None);
        }
        let Some(record) = self.models.get(&id) else {
            return Ok(None);
        };
        let mut node = SceneNode::group(record.name.clone()).with_transform(record.transform);

        let material = record
            .materials
            .first()
            .and_then(|m| self.materials.get(m))
            .cloned();
        let mut meshes: Vec<Mesh> = record
            .geometries
            .iter()
            .filter_map(|g| self.geometries.get(g))
            .map(|mesh| Mesh {
                material: material.clone(),
                ..mesh.clone()
            })
            .collect();
        if meshes.len() == 1 {
            node.mesh = meshes.pop();
        } else {
            for (i, mesh) in meshes.into_iter().enumerate() {
                node.add_child(SceneNode::with_mesh(format!("{}_{i}", record.name), mesh));
            }
        }

        for child in &record.children {
            if let Some(child) = self.build_model(*child, visited, depth + 1)? {
                node.add_child(child);
            }
        }
        Ok(Some(node))
    }
}

/// `"Name\0\x01Class"` → `"Name"`.
fn object_name(object: &FbxNode) -> String {
    object
        .property(1)
        .and_then(Property::as_str)
        .map(|s| s.split("\0\u{1}").next().unwrap_or_default().to_string())
        .unwrap_or_default()
}

fn object_class(object: &FbxNode) -> Option<&str> {
    object.property(2).and_then(Property::as_str)
}

fn read_geometry(geometry: &FbxNode) -> Result<Mesh, String> {
    let vertices = geometry
        .child("Vertices")
        .and_then(|v| v.property(0))
        .and_then(Property::to_f64_vec)
        .unwrap_or_default();
    let positions: Vec<Vec3> = vertices
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect();

    let polygon_indices = geometry
        .child("PolygonVertexIndex")
        .and_then(|v| v.property(0))
        .and_then(Property::to_i64_vec)
        .unwrap_or_default();

    let mut indices = Vec::new();
    let mut polygon: Vec<u32> = Vec::new();
    for raw in polygon_indices {
        // A negative index closes its polygon and is stored bit-inverted.
        let (index, closes) = if raw < 0 { (!raw, true) } else { (raw, false) };
        let index = u32::try_from(index)
            .ok()
            .filter(|&i| (i as usize) < positions.len())
            .ok_or_else(|| format!("polygon vertex index {index} out of range"))?;
        polygon.push(index);
        if closes {
            for i in 1..polygon.len().saturating_sub(1) {
                indices.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
            }
            polygon.clear();
        }
    }

    Ok(Mesh::new(positions).with_indices(indices))
}

fn read_material(material: &FbxNode) -> Material {
    let properties = material.child("Properties70");
    let [r, g, b] = vector_property(properties, "DiffuseColor")
        .or_else(|| vector_property(properties, "Diffuse"))
        .map(|c| c.to_array())
        .unwrap_or([1.0, 1.0, 1.0]);
    let alpha = scalar_property(properties, "Opacity").unwrap_or(1.0);
    Material {
        name: object_name(material),
        color: [r, g, b, alpha as f32],
        map: None,
    }
}

/// `Lcl Translation * PreRotation * Lcl Rotation * Lcl Scaling`, rotations
/// in degrees applied X then Y then Z.
fn local_transform(model: &FbxNode) -> Mat4 {
    let properties = model.child("Properties70");
    let translation = vector_property(properties, "Lcl Translation").unwrap_or(Vec3::ZERO);
    let pre_rotation = vector_property(properties, "PreRotation").unwrap_or(Vec3::ZERO);
    let rotation = vector_property(properties, "Lcl Rotation").unwrap_or(Vec3::ZERO);
    let scaling = vector_property(properties, "Lcl Scaling").unwrap_or(Vec3::ONE);

    Mat4::from_translation(translation)
        * euler_xyz(pre_rotation)
        * euler_xyz(rotation)
        * Mat4::from_scale(scaling)
}

fn euler_xyz(degrees: Vec3) -> Mat4 {
    Mat4::from_rotation_z(degrees.z.to_radians())
        * Mat4::from_rotation_y(degrees.y.to_radians())
        * Mat4::from_rotation_x(degrees.x.to_radians())
}

/// `P` entry values start after name, type, label and flags.
fn property_values<'a>(properties: Option<&'a FbxNode>, name: &str) -> Option<&'a [Property]> {
    properties?
        .children_named("P")
        .find(|p| p.property(0).and_then(Property::as_str) == Some(name))
        .and_then(|p| p.properties.get(4..))
}

fn vector_property(properties: Option<&FbxNode>, name: &str) -> Option<Vec3> {
    let values = property_values(properties, name)?;
    let mut xyz = values.iter().filter_map(Property::as_f64);
    Some(Vec3::new(
        xyz.next()? as f32,
        xyz.next()? as f32,
        xyz.next()? as f32,
    ))
}

fn scalar_property(properties: Option<&FbxNode>, name: &str) -> Option<f64> {
    property_values(properties, name)?.first()?.as_f64()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn node(name: &str, properties: Vec<Property>, children: Vec<FbxNode>) -> FbxNode {
        FbxNode {
            name: name.into(),
            properties,
            children,
        }
    }

    pub(crate) fn p70_vector(name: &str, kind: &str, v: [f64; 3]) -> FbxNode {
        node(
            "P",
            vec![
                Property::String(name.into()),
                Property::String(kind.into()),
                Property::String(String::new()),
                Property::String("A".into()),
                Property::F64(v[0]),
                Property::F64(v[1]),
                Property::F64(v[2]),
            ],
            vec![],
        )
    }

    fn connection(child: i64, parent: i64) -> FbxNode {
        node(
            "C",
            vec![Property::String("OO".into()), Property::I64(child), Property::I64(parent)],
            vec![],
        )
    }

    /// A quad mesh model under a translated parent, with a red material.
    pub(crate) fn quad_document() -> Vec<FbxNode> {
        let geometry = node(
            "Geometry",
            vec![
                Property::I64(10),
                Property::String("Quad\0\u{1}Geometry".into()),
                Property::String("Mesh".into()),
            ],
            vec![
                node(
                    "Vertices",
                    vec![Property::F64Array(vec![
                        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
                    ])],
                    vec![],
                ),
                node("PolygonVertexIndex", vec![Property::I32Array(vec![0, 1, 2, !3])], vec![]),
            ],
        );
        let parent = node(
            "Model",
            vec![
                Property::I64(20),
                Property::String("Pivot\0\u{1}Model".into()),
                Property::String("Null".into()),
            ],
            vec![node(
                "Properties70",
                vec![],
                vec![p70_vector("Lcl Translation", "Lcl Translation", [5.0, 0.0, 0.0])],
            )],
        );
        let model = node(
            "Model",
            vec![
                Property::I64(30),
                Property::String("Quad\0\u{1}Model".into()),
                Property::String("Mesh".into()),
            ],
            vec![node(
                "Properties70",
                vec![],
                vec![p70_vector("Lcl Scaling", "Lcl Scaling", [2.0, 2.0, 2.0])],
            )],
        );
        let material = node(
            "Material",
            vec![
                Property::I64(40),
                Property::String("Red\0\u{1}Material".into()),
                Property::String(String::new()),
            ],
            vec![node(
                "Properties70",
                vec![],
                vec![p70_vector("DiffuseColor", "Color", [1.0, 0.0, 0.0])],
            )],
        );

        vec![
            node(
                "Objects",
                vec![],
                vec![geometry, parent, model, material],
            ),
            node(
                "Connections",
                vec![],
                vec![
                    connection(20, 0),
                    connection(30, 20),
                    connection(10, 30),
                    connection(40, 30),
                ],
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn document(nodes: Vec<FbxNode>) -> FbxDocument {
        FbxDocument {
            version: 7400,
            nodes,
        }
    }

    #[test]
    fn connections_build_the_model_hierarchy() {
        let root = build_scene(&document(quad_document()), "quad").expect("build");
        assert_eq!(root.name, "quad");
        assert_eq!(root.children.len(), 1);

        let pivot = &root.children[0];
        assert_eq!(pivot.name, "Pivot");
        assert!(pivot.mesh.is_none());
        assert_eq!(pivot.children.len(), 1);

        let quad = &pivot.children[0];
        assert_eq!(quad.name, "Quad");
        let mesh = quad.mesh.as_ref().expect("geometry attached");
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.material.as_ref().map(|m| m.color), Some([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn local_transforms_compose_through_the_hierarchy() {
        let root = build_scene(&document(quad_document()), "quad").expect("build");
        let bounds = crate::scene::Aabb::from_node(&root);
        assert_eq!(bounds.min, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(7.0, 2.0, 0.0));
    }

    #[test]
    fn rotation_is_in_degrees() {
        let model = node(
            "Model",
            vec![],
            vec![node(
                "Properties70",
                vec![],
                vec![p70_vector("Lcl Rotation", "Lcl Rotation", [0.0, 0.0, 90.0])],
            )],
        );
        let x = local_transform(&model).transform_point3(Vec3::X);
        assert!((x - Vec3::Y).length() < 1e-6, "got {x:?}");
    }

    #[test]
    fn out_of_range_polygon_index_is_an_error() {
        let geometry = node(
            "Geometry",
            vec![],
            vec![
                node("Vertices", vec![Property::F64Array(vec![0.0; 9])], vec![]),
                node("PolygonVertexIndex", vec![Property::I32Array(vec![0, 1, !7])], vec![]),
            ],
        );
        assert!(read_geometry(&geometry).is_err());
    }

    #[test]
    fn overlong_model_chains_are_rejected() {
        let chain = MAX_NODE_DEPTH as i64 + 10;
        let models = (1..=chain)
            .map(|id| {
                node(
                    "Model",
                    vec![Property::I64(id), Property::String(format!("M{id}"))],
                    vec![],
                )
            })
            .collect();
        let connections = (2..=chain)
            .map(|id| {
                node(
                    "C",
                    vec![Property::String("OO".into()), Property::I64(id), Property::I64(id - 1)],
                    vec![],
                )
            })
            .collect();
        let doc = document(vec![
            node("Objects", vec![], models),
            node("Connections", vec![], connections),
        ]);
        let err = build_scene(&doc, "chain").expect_err("too deep");
        assert!(err.contains("deeper than"), "got {err}");
    }

    #[test]
    fn connection_cycles_do_not_recurse_forever() {
        let mut nodes = quad_document();
        nodes[1].children.push(node(
            "C",
            vec![Property::String("OO".into()), Property::I64(20), Property::I64(30)],
            vec![],
        ));
        let root = build_scene(&document(nodes), "cycle").expect("build");
        assert!(root.children.len() <= 1);
    }
}
