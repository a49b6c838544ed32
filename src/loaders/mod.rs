//! Loader pipeline: one async parse sequence per [`LoadPlan`] variant.
//!
//! # Module structure
//!
//! ```text
//! loaders/
//! ├── obj.rs     : Wavefront OBJ geometry (tobj)
//! ├── mtl.rs     : MTL material libraries and texture preloading
//! ├── textures.rs: texture decoders keyed by file-name pattern
//! ├── glb.rs     : binary glTF (gltf)
//! ├── fbx/       : binary FBX reader and scene builder
//! ├── kmz.rs     : KMZ archives (zip) wrapping a COLLADA model
//! └── collada.rs : COLLADA geometry and node hierarchy (roxmltree)
//! ```
//!
//! The parsers are reached through the [`ModelLoaders`] trait so the
//! pipeline can be driven by a test double. [`NativeLoaders`] is the real
//! implementation: it fetches bytes asynchronously and runs the CPU-bound
//! parse on the blocking thread pool.

pub mod collada;
pub mod fbx;
pub mod glb;
pub mod kmz;
pub mod mtl;
pub mod obj;
pub mod textures;

use std::sync::Arc;

use async_trait::async_trait;

use crate::format::{DroppedFile, LoadPlan};
use crate::scene::SceneNode;

pub use mtl::MaterialLibrary;
pub use textures::{TextureDecoder, TextureHandlers};

/// Errors produced by the loader layer.
///
/// The IPC layer maps all of these to `ViewerError::ParseFailure` at the
/// boundary, keeping the message.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The bytes behind a loadable reference could not be read.
    #[error("cannot read {name}: {message}")]
    Fetch { name: String, message: String },

    /// A parser rejected the file.
    #[error("{format} parse error in {name}: {message}")]
    Parse {
        format: &'static str,
        name: String,
        message: String,
    },

    /// The blocking parse task panicked or was cancelled.
    #[error("loader task failed: {0}")]
    Task(String),
}

impl LoadError {
    pub(crate) fn parse(format: &'static str, name: &str, message: impl ToString) -> Self {
        Self::Parse {
            format,
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Parser output that wraps the scene the viewer shows (GLB and KMZ).
#[derive(Debug, Clone)]
pub struct SceneAsset {
    /// The scene to display.
    pub scene: SceneNode,
    /// Number of scenes the container declared.
    pub scene_count: usize,
}

/// Format-specific parsers, one method per pipeline.
#[async_trait]
pub trait ModelLoaders: Send + Sync {
    async fn load_obj(&self, obj: &DroppedFile) -> Result<SceneNode, LoadError>;

    /// Parse `mtl`, preload its textures, then parse `obj` with those
    /// materials.
    async fn load_obj_mtl(
        &self,
        obj: &DroppedFile,
        mtl: &DroppedFile,
    ) -> Result<SceneNode, LoadError>;

    async fn load_glb(&self, glb: &DroppedFile) -> Result<SceneAsset, LoadError>;

    async fn load_fbx(&self, fbx: &DroppedFile) -> Result<SceneNode, LoadError>;

    async fn load_kmz(&self, kmz: &DroppedFile) -> Result<SceneAsset, LoadError>;
}

/// Run the pipeline for `plan` and return the model's root node.
///
/// Single attempt, no retry; any error leaves nothing behind.
pub async fn load_model(
    plan: &LoadPlan,
    loaders: &dyn ModelLoaders,
) -> Result<SceneNode, LoadError> {
    match plan {
        LoadPlan::Obj { obj } => loaders.load_obj(obj).await,
        LoadPlan::ObjMtl { obj, mtl } => loaders.load_obj_mtl(obj, mtl).await,
        LoadPlan::Glb { glb } => Ok(loaders.load_glb(glb).await?.scene),
        LoadPlan::Fbx { fbx } => loaders.load_fbx(fbx).await,
        LoadPlan::Kmz { kmz } => Ok(loaders.load_kmz(kmz).await?.scene),
    }
}

/// Loaders backed by the in-crate parsers.
#[derive(Clone, Default)]
pub struct NativeLoaders {
    textures: Arc<TextureHandlers>,
}

impl NativeLoaders {
    pub fn new(textures: TextureHandlers) -> Self {
        Self {
            textures: Arc::new(textures),
        }
    }
}

async fn fetch(file: &DroppedFile) -> Result<Vec<u8>, LoadError> {
    file.fetch().await.map_err(|e| LoadError::Fetch {
        name: file.name.clone(),
        message: e.to_string(),
    })
}

/// Parsing is CPU-bound; run it on the blocking thread pool so the async
/// runtime is not starved.
async fn blocking<T, F>(f: F) -> Result<T, LoadError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LoadError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoadError::Task(format!("parse task panicked: {e}")))?
}

#[async_trait]
impl ModelLoaders for NativeLoaders {
    async fn load_obj(&self, obj: &DroppedFile) -> Result<SceneNode, LoadError> {
        let bytes = fetch(obj).await?;
        let name = obj.name.clone();
        blocking(move || obj::parse_obj(&bytes, &name, None)).await
    }

    async fn load_obj_mtl(
        &self,
        obj: &DroppedFile,
        mtl: &DroppedFile,
    ) -> Result<SceneNode, LoadError> {
        let mtl_bytes = fetch(mtl).await?;
        let obj_bytes = fetch(obj).await?;
        let (obj_name, mtl_name) = (obj.name.clone(), mtl.name.clone());
        let base_dir = mtl.base_dir().map(|d| d.to_path_buf());
        let textures = Arc::clone(&self.textures);

        blocking(move || {
            let mut library = MaterialLibrary::parse(mtl_bytes, &mtl_name)?;
            let loaded = library.preload(&textures, base_dir.as_deref());
            tracing::debug!(
                mtl = %mtl_name,
                materials = library.len(),
                textures = loaded,
                "preloaded materials"
            );
            obj::parse_obj(&obj_bytes, &obj_name, Some(&library))
        })
        .await
    }

    async fn load_glb(&self, glb: &DroppedFile) -> Result<SceneAsset, LoadError> {
        let bytes = fetch(glb).await?;
        let name = glb.name.clone();
        blocking(move || glb::parse_glb(&bytes, &name)).await
    }

    async fn load_fbx(&self, fbx: &DroppedFile) -> Result<SceneNode, LoadError> {
        let bytes = fetch(fbx).await?;
        let name = fbx.name.clone();
        blocking(move || fbx::parse_fbx(&bytes, &name)).await
    }

    async fn load_kmz(&self, kmz: &DroppedFile) -> Result<SceneAsset, LoadError> {
        let bytes = fetch(kmz).await?;
        let name = kmz.name.clone();
        blocking(move || kmz::parse_kmz(&bytes, &name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DropSet, FormatResolver};

    const TRIANGLE_OBJ: &str = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn plan_for(files: Vec<DroppedFile>) -> LoadPlan {
        FormatResolver::default()
            .plan(&DropSet::new(files))
            .expect("supported drop")
    }

    #[tokio::test]
    async fn obj_pipeline_returns_parsed_node() {
        let plan = plan_for(vec![DroppedFile::from_bytes(
            "tri.obj",
            TRIANGLE_OBJ.as_bytes().to_vec(),
        )]);
        let node = load_model(&plan, &NativeLoaders::default())
            .await
            .expect("obj loads");
        assert_eq!(node.mesh_count(), 1);
    }

    #[tokio::test]
    async fn obj_mtl_pipeline_applies_materials_regardless_of_order() {
        let obj = "mtllib tri.mtl\no tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n";
        let mtl = "newmtl red\nKd 1 0 0\n";
        let plan = plan_for(vec![
            DroppedFile::from_bytes("tri.mtl", mtl.as_bytes().to_vec()),
            DroppedFile::from_bytes("tri.obj", obj.as_bytes().to_vec()),
        ]);
        let node = load_model(&plan, &NativeLoaders::default())
            .await
            .expect("obj+mtl loads");

        let mesh = node.children[0].mesh.as_ref().expect("mesh");
        let material = mesh.material.as_ref().expect("material bound");
        assert_eq!(material.name, "red");
        assert_eq!(material.color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let plan = plan_for(vec![DroppedFile::from_path("/nonexistent/modelview/scene.glb")]);
        let err = load_model(&plan, &NativeLoaders::default())
            .await
            .expect_err("missing file");
        assert!(matches!(err, LoadError::Fetch { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_glb_is_a_parse_error() {
        let plan = plan_for(vec![DroppedFile::from_bytes("scene.glb", b"not a glb".to_vec())]);
        let err = load_model(&plan, &NativeLoaders::default())
            .await
            .expect_err("malformed glb");
        assert!(matches!(err, LoadError::Parse { format: "GLB", .. }), "got {err:?}");
    }

    #[test]
    fn load_error_display_names_format_and_file() {
        let err = LoadError::parse("FBX", "rig.fbx", "truncated node record");
        assert_eq!(err.to_string(), "FBX parse error in rig.fbx: truncated node record");
    }
}
