//! COLLADA (`.dae`) geometry, materials and node hierarchy.
//!
//! Supports `<triangles>`, `<polylist>` and `<polygons>` primitives with
//! POSITION/NORMAL/TEXCOORD inputs, `<matrix>`/`<translate>`/`<rotate>`/
//! `<scale>` node transforms, and diffuse colours from common-profile
//! effects. The document's `<unit meter>` scales the result and a `Z_UP`
//! asset is rotated into the Y-up frame.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use roxmltree::{Document, Node};

use crate::scene::{Material, Mesh, SceneNode, MAX_NODE_DEPTH};

/// Parse a COLLADA document into a group node.
pub fn parse_collada(text: &str, root_name: &str) -> Result<SceneNode, String> {
    let document = Document::parse(text).map_err(|e| format!("XML parse error: {e}"))?;
    let collada = document.root_element();
    if !is(collada, "COLLADA") {
        return Err("missing <COLLADA> root element".into());
    }

    let materials = read_materials(collada);
    let geometries = read_geometries(collada)?;

    let mut root = SceneNode::group(root_name).with_transform(asset_transform(collada));
    match visual_scene(collada) {
        Some(scene) => {
            for node in children(scene, "node") {
                root.add_child(build_node(node, &geometries, &materials, 0));
            }
        }
        None => {
            for (id, primitives) in &geometries {
                let mut group = SceneNode::group(id.clone());
                for primitive in primitives {
                    group.add_child(SceneNode::with_mesh(id.clone(), primitive.mesh.clone()));
                }
                root.add_child(group);
            }
        }
    }
    Ok(root)
}

// ── Tree helpers ─────────────────────────────────────────────────────────────

fn is(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is(*n, name))
}

fn children<'a, 'i>(node: Node<'a, 'i>, name: &'static str) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(move |n| is(*n, name))
}

/// Follow a chain of child element names.
fn path<'a, 'i>(node: Node<'a, 'i>, names: &[&str]) -> Option<Node<'a, 'i>> {
    names.iter().try_fold(node, |at, name| child(at, name))
}

fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or_default()
}

/// Unit scaling plus the Z-up correction.
fn asset_transform(collada: Node<'_, '_>) -> Mat4 {
    let asset = child(collada, "asset");
    let meter = asset
        .and_then(|a| child(a, "unit"))
        .and_then(|u| u.attribute("meter"))
        .and_then(|m| m.trim().parse::<f32>().ok())
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(1.0);
    let z_up = asset
        .and_then(|a| child(a, "up_axis"))
        .is_some_and(|u| text(u).trim() == "Z_UP");

    let scale = Mat4::from_scale(Vec3::splat(meter));
    if z_up {
        Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2) * scale
    } else {
        scale
    }
}

/// `#id` → `id`.
fn local_ref(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

fn floats(text: &str) -> Vec<f32> {
    text.split_whitespace()
        .filter_map(|v| v.parse().ok())
        .collect()
}

fn ints(text: &str) -> Result<Vec<usize>, String> {
    text.split_whitespace()
        .map(|v| v.parse().map_err(|_| format!("invalid index {v:?}")))
        .collect()
}

fn by_id<'a, 'i>(
    root: Node<'a, 'i>,
    library: &'static str,
    element: &'static str,
) -> HashMap<&'a str, Node<'a, 'i>> {
    children(root, library)
        .flat_map(|lib| children(lib, element))
        .filter_map(|e| e.attribute("id").map(|id| (id, e)))
        .collect()
}

// ── Materials ────────────────────────────────────────────────────────────────

fn read_materials(collada: Node<'_, '_>) -> HashMap<String, Arc<Material>> {
    let effects = by_id(collada, "library_effects", "effect");
    by_id(collada, "library_materials", "material")
        .into_iter()
        .map(|(id, material)| {
            let color = child(material, "instance_effect")
                .and_then(|i| i.attribute("url"))
                .and_then(|url| effects.get(local_ref(url)))
                .and_then(|effect| effect.descendants().find(|n| is(*n, "diffuse")))
                .and_then(|diffuse| child(diffuse, "color"))
                .map(|c| floats(text(c)))
                .filter(|c| c.len() >= 3)
                .map(|c| [c[0], c[1], c[2], c.get(3).copied().unwrap_or(1.0)])
                .unwrap_or([1.0, 1.0, 1.0, 1.0]);
            let name = material.attribute("name").unwrap_or(id);
            (
                id.to_string(),
                Arc::new(Material {
                    name: name.to_string(),
                    color,
                    map: None,
                }),
            )
        })
        .collect()
}

// ── Geometry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Primitive {
    /// Material symbol bound at instantiation time.
    symbol: Option<String>,
    mesh: Mesh,
}

struct Source {
    data: Vec<f32>,
    stride: usize,
}

impl Source {
    fn get(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.stride)?;
        self.data.get(start..start.checked_add(self.stride)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Semantic {
    Position,
    Normal,
    TexCoord,
}

impl Semantic {
    /// Components each element of the source must provide.
    fn width(self) -> usize {
        match self {
            Self::Position | Self::Normal => 3,
            Self::TexCoord => 1,
        }
    }
}

struct Input<'a> {
    semantic: Semantic,
    offset: usize,
    source: &'a Source,
}

fn read_geometries(collada: Node<'_, '_>) -> Result<HashMap<String, Vec<Primitive>>, String> {
    let mut geometries = HashMap::new();
    for (id, geometry) in by_id(collada, "library_geometries", "geometry") {
        let Some(mesh) = child(geometry, "mesh") else {
            continue;
        };
        let primitives = read_mesh(mesh).map_err(|e| format!("geometry {id:?}: {e}"))?;
        geometries.insert(id.to_string(), primitives);
    }
    Ok(geometries)
}

fn input_offset(input: Node<'_, '_>) -> Result<usize, String> {
    match input.attribute("offset") {
        None => Ok(0),
        Some(o) => o
            .trim()
            .parse()
            .map_err(|_| format!("invalid input offset {o:?}")),
    }
}

fn read_mesh(mesh: Node<'_, '_>) -> Result<Vec<Primitive>, String> {
    let sources: HashMap<&str, Source> = children(mesh, "source")
        .filter_map(|s| {
            let id = s.attribute("id")?;
            let data = floats(text(child(s, "float_array")?));
            let stride = path(s, &["technique_common", "accessor"])
                .and_then(|a| a.attribute("stride"))
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(3);
            Some((id, Source { data, stride }))
        })
        .collect();

    // <vertices> aliases the POSITION source under its own id.
    let vertices: HashMap<&str, &str> = children(mesh, "vertices")
        .filter_map(|v| {
            let position =
                children(v, "input").find(|i| i.attribute("semantic") == Some("POSITION"))?;
            Some((v.attribute("id")?, local_ref(position.attribute("source")?)))
        })
        .collect();

    let mut primitives = Vec::new();
    for element in mesh.children().filter(Node::is_element) {
        let kind = element.tag_name().name();
        if !matches!(kind, "triangles" | "polylist" | "polygons") {
            continue;
        }

        let mut inputs = Vec::new();
        let mut max_offset = 0;
        for input in children(element, "input") {
            let offset = input_offset(input)?;
            max_offset = max_offset.max(offset);
            let semantic = match input.attribute("semantic") {
                Some("VERTEX") => Semantic::Position,
                Some("NORMAL") => Semantic::Normal,
                Some("TEXCOORD") if input.attribute("set").unwrap_or("0") == "0" => {
                    Semantic::TexCoord
                }
                _ => continue,
            };
            let mut source_id = local_ref(input.attribute("source").unwrap_or_default());
            if semantic == Semantic::Position {
                source_id = vertices.get(source_id).copied().unwrap_or(source_id);
            }
            let source = sources
                .get(source_id)
                .ok_or_else(|| format!("missing source {source_id:?}"))?;
            if source.stride < semantic.width() {
                return Err(format!(
                    "{semantic:?} source {source_id:?} has stride {}, expected at least {}",
                    source.stride,
                    semantic.width()
                ));
            }
            inputs.push(Input {
                semantic,
                offset,
                source,
            });
        }
        if !inputs.iter().any(|i| i.semantic == Semantic::Position) {
            return Err(format!("<{kind}> has no VERTEX input"));
        }
        let stride = max_offset
            .checked_add(1)
            .ok_or_else(|| format!("<{kind}> input offset {max_offset} is out of range"))?;

        let polygons: Vec<Vec<usize>> = match kind {
            "triangles" => {
                let triangle_len = stride
                    .checked_mul(3)
                    .ok_or_else(|| format!("<{kind}> input offset {max_offset} is out of range"))?;
                let p = child(element, "p").map(|p| ints(text(p))).transpose()?;
                p.unwrap_or_default()
                    .chunks_exact(triangle_len)
                    .map(<[usize]>::to_vec)
                    .collect()
            }
            "polylist" => {
                let p = child(element, "p").map(|p| ints(text(p))).transpose()?;
                let counts = child(element, "vcount").map(|v| ints(text(v))).transpose()?;
                split_polylist(&p.unwrap_or_default(), &counts.unwrap_or_default(), stride)?
            }
            _ => children(element, "p")
                .map(|p| ints(text(p)))
                .collect::<Result<_, _>>()?,
        };

        primitives.push(Primitive {
            symbol: element.attribute("material").map(str::to_string),
            mesh: assemble(&polygons, &inputs, stride)?,
        });
    }
    Ok(primitives)
}

fn split_polylist(p: &[usize], counts: &[usize], stride: usize) -> Result<Vec<Vec<usize>>, String> {
    const SHORT: &str = "<polylist> <p> is shorter than its <vcount>";
    let mut polygons = Vec::with_capacity(counts.len().min(p.len()));
    let mut at = 0_usize;
    for &count in counts {
        let end = count
            .checked_mul(stride)
            .and_then(|len| at.checked_add(len))
            .ok_or(SHORT)?;
        polygons.push(p.get(at..end).ok_or(SHORT)?.to_vec());
        at = end;
    }
    Ok(polygons)
}

fn vec3(value: &[f32]) -> Option<Vec3> {
    match value {
        [x, y, z, ..] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}

/// Expand polygon corners into vertices and fan-triangulate each polygon.
fn assemble(polygons: &[Vec<usize>], inputs: &[Input<'_>], stride: usize) -> Result<Mesh, String> {
    let has = |s: Semantic| inputs.iter().any(|i| i.semantic == s);
    let mut positions = Vec::new();
    let mut normals = has(Semantic::Normal).then(Vec::new);
    let mut uvs = has(Semantic::TexCoord).then(Vec::new);
    let mut indices = Vec::new();

    for polygon in polygons {
        let first = positions.len() as u32;
        let corners = polygon.len() / stride;
        for corner in polygon.chunks_exact(stride) {
            for input in inputs {
                // Offsets never exceed the largest one, so they index the corner.
                let index = corner[input.offset];
                let value = input
                    .source
                    .get(index)
                    .ok_or_else(|| format!("index {index} out of range"))?;
                let short = || format!("{:?} element {index} is too short", input.semantic);
                match input.semantic {
                    Semantic::Position => positions.push(vec3(value).ok_or_else(short)?),
                    Semantic::Normal => {
                        if let Some(n) = normals.as_mut() {
                            n.push(vec3(value).ok_or_else(short)?);
                        }
                    }
                    Semantic::TexCoord => {
                        if let Some(t) = uvs.as_mut() {
                            let u = value.first().copied().ok_or_else(short)?;
                            t.push(Vec2::new(u, value.get(1).copied().unwrap_or(0.0)));
                        }
                    }
                }
            }
        }
        for i in 1..corners.saturating_sub(1) as u32 {
            indices.extend_from_slice(&[first, first + i, first + i + 1]);
        }
    }

    let mut mesh = Mesh::new(positions).with_indices(indices);
    mesh.normals = normals.filter(|n| n.len() == mesh.positions.len());
    mesh.uvs = uvs.filter(|t| t.len() == mesh.positions.len());
    Ok(mesh)
}

// ── Scene ────────────────────────────────────────────────────────────────────

fn visual_scene<'a, 'i>(collada: Node<'a, 'i>) -> Option<Node<'a, 'i>> {
    let scenes = by_id(collada, "library_visual_scenes", "visual_scene");
    path(collada, &["scene", "instance_visual_scene"])
        .and_then(|i| i.attribute("url"))
        .and_then(|url| scenes.get(local_ref(url)).copied())
        .or_else(|| {
            child(collada, "library_visual_scenes").and_then(|lib| child(lib, "visual_scene"))
        })
}

fn build_node(
    node: Node<'_, '_>,
    geometries: &HashMap<String, Vec<Primitive>>,
    materials: &HashMap<String, Arc<Material>>,
    depth: usize,
) -> SceneNode {
    let name = node
        .attribute("name")
        .or_else(|| node.attribute("id"))
        .unwrap_or_default();
    let mut out = SceneNode::group(name).with_transform(node_transform(node));

    for instance in children(node, "instance_geometry") {
        let Some(primitives) = instance
            .attribute("url")
            .and_then(|url| geometries.get(local_ref(url)))
        else {
            continue;
        };
        let bindings: HashMap<&str, &str> = path(instance, &["bind_material", "technique_common"])
            .into_iter()
            .flat_map(|t| children(t, "instance_material"))
            .filter_map(|m| Some((m.attribute("symbol")?, local_ref(m.attribute("target")?))))
            .collect();

        for primitive in primitives {
            let material = primitive
                .symbol
                .as_deref()
                .and_then(|s| bindings.get(s).copied().or(Some(s)))
                .and_then(|id| materials.get(id))
                .cloned();
            out.add_child(SceneNode::with_mesh(
                name,
                Mesh {
                    material,
                    ..primitive.mesh.clone()
                },
            ));
        }
    }

    if depth < MAX_NODE_DEPTH {
        for child in children(node, "node") {
            out.add_child(build_node(child, geometries, materials, depth + 1));
        }
    } else if children(node, "node").next().is_some() {
        tracing::warn!(
            node = %name,
            max_depth = MAX_NODE_DEPTH,
            "COLLADA node hierarchy truncated"
        );
    }
    out
}

/// Compose the node's transform elements in document order.
fn node_transform(node: Node<'_, '_>) -> Mat4 {
    node.children()
        .filter(Node::is_element)
        .fold(Mat4::IDENTITY, |acc, element| {
            let v = floats(text(element));
            let step = match (element.tag_name().name(), v.len()) {
                // COLLADA matrices are row-major.
                ("matrix", 16) => Mat4::from_cols_slice(&v).transpose(),
                ("translate", 3) => Mat4::from_translation(Vec3::new(v[0], v[1], v[2])),
                ("scale", 3) => Mat4::from_scale(Vec3::new(v[0], v[1], v[2])),
                ("rotate", 4) => {
                    let axis = Vec3::new(v[0], v[1], v[2]).normalize_or_zero();
                    if axis == Vec3::ZERO {
                        Mat4::IDENTITY
                    } else {
                        Mat4::from_axis_angle(axis, v[3].to_radians())
                    }
                }
                _ => Mat4::IDENTITY,
            };
            acc * step
        })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// One red triangle instanced under a translated node, Z-up, centimetres.
    pub(crate) const TRIANGLE_DAE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <asset>
    <unit name="centimeter" meter="0.01"/>
    <up_axis>Z_UP</up_axis>
  </asset>
  <library_effects>
    <effect id="red-fx">
      <profile_COMMON><technique sid="common"><lambert>
        <diffuse><color>1 0 0 1</color></diffuse>
      </lambert></technique></profile_COMMON>
    </effect>
  </library_effects>
  <library_materials>
    <material id="red-mat" name="Red"><instance_effect url="#red-fx"/></material>
  </library_materials>
  <library_geometries>
    <geometry id="tri-geom">
      <mesh>
        <source id="tri-pos">
          <float_array id="tri-pos-array" count="9">0 0 0 100 0 0 0 0 100</float_array>
          <technique_common><accessor source="#tri-pos-array" count="3" stride="3"/></technique_common>
        </source>
        <vertices id="tri-vtx"><input semantic="POSITION" source="#tri-pos"/></vertices>
        <triangles material="redSymbol" count="1">
          <input semantic="VERTEX" source="#tri-vtx" offset="0"/>
          <p>0 1 2</p>
        </triangles>
      </mesh>
    </geometry>
  </library_geometries>
  <library_visual_scenes>
    <visual_scene id="scene">
      <node id="tri-node" name="Triangle">
        <translate>0 0 100</translate>
        <instance_geometry url="#tri-geom">
          <bind_material><technique_common>
            <instance_material symbol="redSymbol" target="#red-mat"/>
          </technique_common></bind_material>
        </instance_geometry>
      </node>
    </visual_scene>
  </library_visual_scenes>
  <scene><instance_visual_scene url="#scene"/></scene>
</COLLADA>"##;
}
