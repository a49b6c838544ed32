//! The viewer session: one scene, one camera, one set of orbit controls.
//!
//! # Concurrency
//! Loads are serialized by an async gate taken with `try_lock`, so a drop
//! that arrives while another load is running is rejected with
//! [`ViewerError::LoadInProgress`] instead of queueing. View state sits
//! behind a [`RwLock`]; a successful load attaches the model and re-frames
//! the camera inside a single write-locked step, so readers never observe a
//! half-attached model. A failed load never touches view state.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use uuid::Uuid;

use crate::camera::{frame, CameraState, CameraView, OrbitControls, OrbitInput};
use crate::config::{FramingConfig, ViewerConfig};
use crate::error::ViewerError;
use crate::export::{export_glb, Delivery, DownloadDirSink, FileSink};
use crate::format::{DropSet, FormatResolver, FormatTag};
use crate::loaders::{load_model, ModelLoaders, NativeLoaders};
use crate::scene::{repair_normals, Aabb, Scene, SceneView};

/// Everything the renderer reads each frame.
#[derive(Debug)]
pub struct ViewState {
    pub scene: Scene,
    pub camera: CameraState,
    pub controls: OrbitControls,
}

/// Summary of a successful load, returned to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub format: FormatTag,
    pub model_id: Uuid,
    pub model_name: String,
    pub mesh_count: usize,
    pub bounds: Aabb,
    /// Framing fell back to the minimum camera distance.
    pub degenerate: bool,
    pub camera: CameraView,
    pub scene: SceneView,
    /// RFC-3339 UTC timestamp.
    pub loaded_at: String,
}

pub struct ViewerSession {
    view: RwLock<ViewState>,
    load_gate: tokio::sync::Mutex<()>,
    loaders: Arc<dyn ModelLoaders>,
    sink: Arc<dyn FileSink>,
    resolver: FormatResolver,
    framing: FramingConfig,
    export_name: String,
}

impl ViewerSession {
    pub fn new(
        config: &ViewerConfig,
        loaders: Arc<dyn ModelLoaders>,
        sink: Arc<dyn FileSink>,
    ) -> Self {
        let camera = CameraState::new(&config.camera, config.framing.up_axis.up());
        let mut controls = OrbitControls::new(&config.controls);
        controls.save_state(&camera);

        Self {
            view: RwLock::new(ViewState {
                scene: Scene::new(config.scene.background),
                camera,
                controls,
            }),
            load_gate: tokio::sync::Mutex::new(()),
            loaders,
            sink,
            resolver: FormatResolver::new(config.formats.kmz),
            framing: config.framing.clone(),
            export_name: config.export.file_name.clone(),
        }
    }

    /// Session backed by the built-in parsers and the download-dir sink.
    pub fn with_defaults(config: &ViewerConfig) -> Self {
        Self::new(
            config,
            Arc::new(NativeLoaders::default()),
            Arc::new(DownloadDirSink::new()),
        )
    }

    fn read_view(&self) -> Result<RwLockReadGuard<'_, ViewState>, ViewerError> {
        self.view
            .read()
            .map_err(|_| ViewerError::Io("view state lock poisoned".to_string()))
    }

    fn write_view(&self) -> Result<RwLockWriteGuard<'_, ViewState>, ViewerError> {
        self.view
            .write()
            .map_err(|_| ViewerError::Io("view state lock poisoned".to_string()))
    }

    /// Resolve, parse and display one drop.
    ///
    /// On success the new model replaces whatever was shown and the camera
    /// is re-framed. On any error the scene is left exactly as it was.
    pub async fn load(&self, drop_set: DropSet) -> Result<LoadReport, ViewerError> {
        let _gate = self
            .load_gate
            .try_lock()
            .map_err(|_| ViewerError::LoadInProgress)?;

        let plan = self.resolver.plan(&drop_set).map_err(|e| {
            tracing::info!("rejected drop: {e}");
            ViewerError::from(e)
        })?;
        let format = plan.tag();
        tracing::info!(?format, file = %plan.primary_name(), "loading model");

        let mut model = load_model(&plan, self.loaders.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!(?format, "load failed: {e}");
                ViewerError::from(e)
            })?;

        let repaired = repair_normals(&mut model);
        if repaired > 0 {
            tracing::debug!(meshes = repaired, "computed missing vertex normals");
        }

        let mut view = self.write_view()?;
        let ViewState {
            scene,
            camera,
            controls,
        } = &mut *view;

        let framing = frame(camera, controls, &model, &self.framing);
        let (model_id, model_name, mesh_count) =
            (model.id, model.name.clone(), model.mesh_count());
        scene.replace_model(model);

        tracing::info!(
            ?format,
            model = %model_name,
            meshes = mesh_count,
            distance = framing.distance,
            "model loaded"
        );

        Ok(LoadReport {
            format,
            model_id,
            model_name,
            mesh_count,
            bounds: framing.bounds,
            degenerate: framing.degenerate,
            camera: CameraView::capture(camera, controls),
            scene: SceneView::from(&*scene),
            loaded_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        })
    }

    /// Advance the controls by `dt` seconds and return the camera to draw.
    pub fn tick(&self, dt: f32) -> Result<CameraView, ViewerError> {
        let mut view = self.write_view()?;
        let ViewState {
            camera, controls, ..
        } = &mut *view;
        controls.update(camera, dt);
        Ok(CameraView::capture(camera, controls))
    }

    /// Track the viewport size. Only the aspect ratio changes; the model is
    /// never re-framed.
    pub fn resize(&self, width: u32, height: u32) -> Result<CameraView, ViewerError> {
        let mut view = self.write_view()?;
        view.camera.set_viewport(width, height);
        Ok(CameraView::capture(&view.camera, &view.controls))
    }

    pub fn orbit(&self, input: OrbitInput) -> Result<CameraView, ViewerError> {
        let mut view = self.write_view()?;
        let ViewState {
            camera, controls, ..
        } = &mut *view;
        controls.apply(camera, input);
        Ok(CameraView::capture(camera, controls))
    }

    /// Return to the pose saved by the last framing.
    pub fn reset_view(&self) -> Result<CameraView, ViewerError> {
        let mut view = self.write_view()?;
        let ViewState {
            camera, controls, ..
        } = &mut *view;
        controls.reset(camera);
        Ok(CameraView::capture(camera, controls))
    }

    /// Remove every model and restore the default lights.
    pub fn reset(&self) -> Result<SceneView, ViewerError> {
        let mut view = self.write_view()?;
        view.scene.reset();
        tracing::info!("scene reset");
        Ok(SceneView::from(&view.scene))
    }

    pub fn scene_view(&self) -> Result<SceneView, ViewerError> {
        Ok(SceneView::from(&self.read_view()?.scene))
    }

    pub fn camera_view(&self) -> Result<CameraView, ViewerError> {
        let view = self.read_view()?;
        Ok(CameraView::capture(&view.camera, &view.controls))
    }

    /// Encode the scene as GLB and hand it to the sink.
    pub fn export(&self) -> Result<Delivery, ViewerError> {
        let bytes = {
            let view = self.read_view()?;
            export_glb(&view.scene)?
        };
        tracing::info!(name = %self.export_name, bytes = bytes.len(), "exporting scene");
        Ok(self.sink.deliver(&self.export_name, &bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use glam::Vec3;

    use super::*;
    use crate::export::ExportError;
    use crate::format::DroppedFile;
    use crate::loaders::{LoadError, SceneAsset};
    use crate::scene::{Mesh, SceneNode};

    /// Loader double returning a fixed model, or rejecting when `fail` is set.
    #[derive(Default)]
    struct StubLoaders {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl StubLoaders {
        fn record(&self, call: &str) -> Result<SceneNode, LoadError> {
            self.calls.lock().expect("calls").push(call.to_string());
            if self.fail {
                return Err(LoadError::parse("STUB", call, "rejected"));
            }
            let mut root = SceneNode::group(call);
            root.add_child(SceneNode::with_mesh(
                "cube",
                Mesh::new(vec![Vec3::splat(-1.0), Vec3::new(1.0, -1.0, -1.0), Vec3::splat(1.0)]),
            ));
            Ok(root)
        }
    }

    #[async_trait]
    impl ModelLoaders for StubLoaders {
        async fn load_obj(&self, _obj: &DroppedFile) -> Result<SceneNode, LoadError> {
            self.record("obj")
        }
        async fn load_obj_mtl(
            &self,
            _obj: &DroppedFile,
            _mtl: &DroppedFile,
        ) -> Result<SceneNode, LoadError> {
            self.record("obj_mtl")
        }
        async fn load_glb(&self, _glb: &DroppedFile) -> Result<SceneAsset, LoadError> {
            Ok(SceneAsset {
                scene: self.record("glb")?,
                scene_count: 1,
            })
        }
        async fn load_fbx(&self, _fbx: &DroppedFile) -> Result<SceneNode, LoadError> {
            self.record("fbx")
        }
        async fn load_kmz(&self, _kmz: &DroppedFile) -> Result<SceneAsset, LoadError> {
            Ok(SceneAsset {
                scene: self.record("kmz")?,
                scene_count: 1,
            })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        files: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl FileSink for MemorySink {
        fn deliver(&self, name: &str, bytes: &[u8]) -> Result<Delivery, ExportError> {
            self.files
                .lock()
                .expect("files")
                .push((name.to_string(), bytes.to_vec()));
            Ok(Delivery {
                name: name.to_string(),
                location: format!("memory:{name}"),
                bytes: bytes.len(),
            })
        }
    }

    fn session(loaders: Arc<StubLoaders>, sink: Arc<MemorySink>) -> ViewerSession {
        ViewerSession::new(&ViewerConfig::default(), loaders, sink)
    }

    fn drop_of(names: &[&str]) -> DropSet {
        DropSet::new(
            names
                .iter()
                .map(|n| DroppedFile::from_bytes(*n, Vec::new()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn successful_load_attaches_model_and_frames_camera() {
        let loaders = Arc::new(StubLoaders::default());
        let session = session(Arc::clone(&loaders), Arc::default());

        let report = session.load(drop_of(&["a.fbx"])).await.expect("load");
        assert_eq!(report.format, FormatTag::Fbx);
        assert_eq!(report.mesh_count, 1);
        assert!(!report.degenerate);
        assert!(report.camera.auto_rotate);
        assert!(report.camera.far > 0.0);
        assert_eq!(report.scene.meshes.len(), 1);
        assert!(
            !report.scene.meshes[0].normals.is_empty(),
            "normals are repaired before attach"
        );

        let view = session.read_view().expect("view");
        assert_eq!(view.scene.models.len(), 1);
        assert_eq!(view.controls.target, Vec3::ZERO);
    }

    #[tokio::test]
    async fn second_load_replaces_first() {
        let session = session(Arc::default(), Arc::default());
        let first = session.load(drop_of(&["a.obj"])).await.expect("first");
        let second = session.load(drop_of(&["b.glb"])).await.expect("second");
        assert_ne!(first.model_id, second.model_id);
        let view = session.read_view().expect("view");
        assert_eq!(view.scene.models.len(), 1);
        assert_eq!(view.scene.models[0].id, second.model_id);
    }

    #[tokio::test]
    async fn failed_load_leaves_scene_untouched() {
        let session = session(
            Arc::new(StubLoaders {
                fail: true,
                ..StubLoaders::default()
            }),
            Arc::default(),
        );
        let before = session.camera_view().expect("camera");
        let err = session.load(drop_of(&["scene.glb"])).await.expect_err("rejected");
        assert!(matches!(err, ViewerError::ParseFailure(_)));
        assert!(session.scene_view().expect("scene").meshes.is_empty());
        assert_eq!(session.camera_view().expect("camera").position, before.position);
    }

    #[tokio::test]
    async fn unsupported_drop_never_reaches_a_loader() {
        let loaders = Arc::new(StubLoaders::default());
        let session = session(Arc::clone(&loaders), Arc::default());
        let err = session.load(drop_of(&["model.stl"])).await.expect_err("unsupported");
        assert!(matches!(err, ViewerError::UnsupportedFormat(_)));
        assert!(loaders.calls.lock().expect("calls").is_empty());
    }

    #[tokio::test]
    async fn kmz_can_be_disabled_by_configuration() {
        let mut config = ViewerConfig::default();
        config.formats.kmz = false;
        let session = ViewerSession::new(
            &config,
            Arc::new(StubLoaders::default()),
            Arc::new(MemorySink::default()),
        );
        let err = session.load(drop_of(&["site.kmz"])).await.expect_err("disabled");
        assert!(matches!(err, ViewerError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn load_is_rejected_while_gate_is_held() {
        let session = session(Arc::default(), Arc::default());
        let _held = session.load_gate.try_lock().expect("gate free");
        let err = session.load(drop_of(&["a.obj"])).await.expect_err("busy");
        assert!(matches!(err, ViewerError::LoadInProgress));
    }

    #[tokio::test]
    async fn resize_changes_aspect_but_not_framing() {
        let session = session(Arc::default(), Arc::default());
        let report = session.load(drop_of(&["a.obj"])).await.expect("load");
        let view = session.resize(1600, 800).expect("resize");
        assert_eq!(view.aspect, 2.0);
        assert_eq!(view.far, report.camera.far);
        assert_eq!(view.position, report.camera.position);
    }

    #[tokio::test]
    async fn reset_view_returns_to_framed_pose() {
        let session = session(Arc::default(), Arc::default());
        let report = session.load(drop_of(&["a.obj"])).await.expect("load");
        session
            .orbit(OrbitInput::Rotate {
                azimuth: 1.0,
                polar: 0.2,
            })
            .expect("orbit");
        session.tick(0.5).expect("tick");
        let view = session.reset_view().expect("reset view");
        for (a, b) in view.position.iter().zip(report.camera.position) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn reset_clears_models_and_keeps_lights() {
        let session = session(Arc::default(), Arc::default());
        session.load(drop_of(&["a.obj"])).await.expect("load");
        let scene = session.reset().expect("reset");
        assert!(scene.meshes.is_empty());
        assert_eq!(scene.lights.len(), 2);
    }

    #[tokio::test]
    async fn export_delivers_configured_file_name() {
        let sink = Arc::new(MemorySink::default());
        let session = session(Arc::default(), Arc::clone(&sink));
        session.load(drop_of(&["a.obj"])).await.expect("load");

        let delivery = session.export().expect("export");
        assert_eq!(delivery.name, "export.glb");
        let files = sink.files.lock().expect("files");
        assert_eq!(files.len(), 1);
        assert_eq!(&files[0].1[0..4], b"glTF");
    }
}
