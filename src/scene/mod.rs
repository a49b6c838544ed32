//! In-memory scene graph shared by the loaders, the camera framer and the
//! exporter.
//!
//! ```text
//! scene/
//! ├── node.rs   : SceneNode / Mesh / Material / Texture
//! ├── bounds.rs : axis-aligned bounding volumes
//! ├── normals.rs: vertex normal repair
//! └── view.rs   : flattened, serializable view for the renderer
//! ```

pub mod bounds;
pub mod node;
pub mod normals;
pub mod view;

pub use bounds::Aabb;
pub use node::{Material, Mesh, SceneNode, Texture, MAX_NODE_DEPTH};
pub use normals::{compute_vertex_normals, repair_normals};
pub use view::SceneView;

use serde::Serialize;

/// Light sources the viewer adds to every scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Light {
    Ambient {
        color: u32,
        intensity: f32,
    },
    #[serde(rename_all = "camelCase")]
    Hemisphere {
        sky_color: u32,
        ground_color: u32,
        intensity: f32,
    },
}

/// Soft white fill plus a warm sky / cool ground hemisphere.
const DEFAULT_LIGHTS: [Light; 2] = [
    Light::Ambient {
        color: 0x404040,
        intensity: 1.0,
    },
    Light::Hemisphere {
        sky_color: 0xffffbb,
        ground_color: 0x454580,
        intensity: 1.0,
    },
];

/// Root of everything the renderer draws.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Clear colour as linear RGB.
    pub background: [f32; 3],
    pub lights: Vec<Light>,
    /// Loaded model roots. The session keeps at most one.
    pub models: Vec<SceneNode>,
}

impl Scene {
    pub fn new(background: [f32; 3]) -> Self {
        let mut scene = Self {
            background,
            lights: Vec::new(),
            models: Vec::new(),
        };
        scene.reset();
        scene
    }

    /// Remove every model and restore the default lights.
    pub fn reset(&mut self) {
        self.models.clear();
        self.lights = DEFAULT_LIGHTS.to_vec();
    }

    /// Replace the scene contents with `model` in one step.
    pub fn replace_model(&mut self, model: SceneNode) {
        self.reset();
        self.models.push(model);
    }

    /// The current model, if one is loaded.
    pub fn model(&self) -> Option<&SceneNode> {
        self.models.first()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new([0.0, 0.0, 0.0])
    }
}
