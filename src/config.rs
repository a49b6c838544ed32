//! Viewer configuration loaded from `viewer.toml`.
//!
//! Every key is optional; anything missing falls back to the built-in
//! default, so an absent file yields [`ViewerConfig::default`].
//!
//! ```toml
//! [camera]
//! fov_deg = 60.0
//!
//! [framing]
//! margin = 1.25
//! far_multiplier = 3.0
//! up_axis = "z"
//! ```

use std::path::{Path, PathBuf};

use glam::Vec3;

/// Errors raised while reading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Read(String),
    #[error("config error: {0}")]
    Invalid(String),
}

/// World "up" convention shared by the camera, the framer and the controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpAxis {
    /// Y up; the default camera looks down −Z from the +Z side.
    #[default]
    Y,
    /// Z up; the default camera looks down +Y from the −Y side.
    Z,
}

impl UpAxis {
    pub fn up(self) -> Vec3 {
        match self {
            UpAxis::Y => Vec3::Y,
            UpAxis::Z => Vec3::Z,
        }
    }

    /// Unit direction from the framed object's centre towards the camera.
    pub fn view_axis(self) -> Vec3 {
        match self {
            UpAxis::Y => Vec3::Z,
            UpAxis::Z => Vec3::NEG_Y,
        }
    }
}

/// `[camera]`: initial perspective camera.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    /// Position before the first model is framed.
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 60.0,
            near: 1.0,
            far: 1000.0,
            position: [400.0, 200.0, 0.0],
        }
    }
}

/// `[framing]`: constants used when fitting the camera to a new model.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FramingConfig {
    /// Zoom-out factor applied to the heuristic camera distance.
    pub margin: f32,
    /// Far plane = camera-to-far-edge distance × this factor.
    pub far_multiplier: f32,
    /// Orbit max distance = camera-to-far-edge distance × this factor.
    pub orbit_distance_multiplier: f32,
    /// Distance floor for zero-volume models.
    pub min_distance: f32,
    pub up_axis: UpAxis,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            margin: 1.25,
            far_multiplier: 3.0,
            orbit_distance_multiplier: 2.0,
            min_distance: 1.0,
            up_axis: UpAxis::Y,
        }
    }
}

/// `[controls]`: orbit controls.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ControlsConfig {
    /// 2.0 is one revolution every 30 seconds.
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            auto_rotate_speed: 2.0,
            min_distance: 0.0,
        }
    }
}

/// `[formats]`: optional loader pipelines.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FormatsConfig {
    pub kmz: bool,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self { kmz: true }
    }
}

/// `[export]`: scene export.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExportConfig {
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "export.glb".to_string(),
        }
    }
}

/// `[scene]`: scene appearance.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SceneConfig {
    pub background: [f32; 3],
}

/// Complete viewer configuration.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub framing: FramingConfig,
    pub controls: ControlsConfig,
    pub formats: FormatsConfig,
    pub export: ExportConfig,
    pub scene: SceneConfig,
}

/// Parse a TOML string into a [`ViewerConfig`], running validation.
pub fn parse(toml_str: &str) -> Result<ViewerConfig, ConfigError> {
    let cfg: ViewerConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Read and parse the configuration file at `path`.
pub fn load(path: &Path) -> Result<ViewerConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    parse(&text)
}

/// Default location: `<config_dir>/modelview/viewer.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("modelview").join("viewer.toml"))
}

/// Load the configuration from [`default_path`], falling back to defaults
/// when the file is absent or invalid.
pub fn load_or_default() -> ViewerConfig {
    let Some(path) = default_path() else {
        return ViewerConfig::default();
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return ViewerConfig::default();
    }
    match load(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "loaded viewer config");
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
            ViewerConfig::default()
        }
    }
}

fn validate(cfg: &ViewerConfig) -> Result<(), ConfigError> {
    let fov = cfg.camera.fov_deg;
    if !(fov > 0.0 && fov < 180.0) {
        return Err(ConfigError::Invalid(format!(
            "camera.fov_deg must be between 0 and 180, got {fov}"
        )));
    }

    if !(cfg.camera.near > 0.0 && cfg.camera.far > cfg.camera.near) {
        return Err(ConfigError::Invalid(
            "camera.near must be positive and less than camera.far".to_string(),
        ));
    }

    let positive = [
        ("framing.margin", cfg.framing.margin),
        ("framing.far_multiplier", cfg.framing.far_multiplier),
        (
            "framing.orbit_distance_multiplier",
            cfg.framing.orbit_distance_multiplier,
        ),
        ("framing.min_distance", cfg.framing.min_distance),
    ];
    for (key, value) in positive {
        if !(value > 0.0 && value.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "{key} must be a positive number, got {value}"
            )));
        }
    }

    // The far plane must sit beyond the framed camera distance.
    if cfg.framing.far_multiplier <= 1.0 {
        return Err(ConfigError::Invalid(format!(
            "framing.far_multiplier must be greater than 1, got {}",
            cfg.framing.far_multiplier
        )));
    }
    if cfg.framing.orbit_distance_multiplier < 1.0 {
        return Err(ConfigError::Invalid(format!(
            "framing.orbit_distance_multiplier must be at least 1, got {}",
            cfg.framing.orbit_distance_multiplier
        )));
    }

    if cfg.controls.min_distance < 0.0 {
        return Err(ConfigError::Invalid(
            "controls.min_distance must not be negative".to_string(),
        ));
    }

    let name = &cfg.export.file_name;
    if !name.to_ascii_lowercase().ends_with(".glb") || name.contains(['/', '\\']) {
        return Err(ConfigError::Invalid(format!(
            "export.file_name must be a plain .glb file name, got {name:?}"
        )));
    }

    Ok(())
}
