//! Scene-level command handlers: load, snapshot, reset, export, recents.

use std::sync::RwLock;

use crate::error::ViewerError;
use crate::export::Delivery;
use crate::format::{DropSet, DroppedFile};
use crate::scene::SceneView;
use crate::session::{LoadReport, ViewerSession};
use crate::state::{AppState, UserPreferences};

use super::{read_preferences, write_preferences};

// ── Input type ────────────────────────────────────────────────────────────────

/// One file from a drop gesture as sent by the webview.
///
/// Desktop drops carry a `path`; browser-style drops carry the file's bytes
/// in `data`. When both are present the bytes win.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedFileInput {
    pub name: String,
    pub path: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl TryFrom<DroppedFileInput> for DroppedFile {
    type Error = ViewerError;

    fn try_from(input: DroppedFileInput) -> Result<Self, Self::Error> {
        match (input.data, input.path) {
            (Some(data), _) => Ok(DroppedFile::from_bytes(input.name, data)),
            (None, Some(path)) => Ok(DroppedFile {
                name: input.name,
                ..DroppedFile::from_path(path)
            }),
            (None, None) => Err(ViewerError::Io(format!(
                "dropped file {:?} has neither a path nor data",
                input.name
            ))),
        }
    }
}

// ── load_files ────────────────────────────────────────────────────────────────

/// Testable inner logic for [`load_files`].
///
/// Builds the drop set, runs the session load and, on success, records the
/// dropped names in the recent-files list.
pub(crate) async fn load_files_inner(
    files: Vec<DroppedFileInput>,
    session: &ViewerSession,
    preferences: &RwLock<UserPreferences>,
) -> Result<LoadReport, ViewerError> {
    let files = files
        .into_iter()
        .map(DroppedFile::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();

    let report = session.load(DropSet::new(files)).await?;

    write_preferences(preferences)?.push_recent(names.iter().map(String::as_str));
    Ok(report)
}

// ── recent_files ──────────────────────────────────────────────────────────────

pub(crate) fn recent_files_inner(
    preferences: &RwLock<UserPreferences>,
) -> Result<Vec<String>, ViewerError> {
    Ok(read_preferences(preferences)?
        .recent_files
        .iter()
        .cloned()
        .collect())
}

// ── Tauri command wrappers ────────────────────────────────────────────────────

/// Load the files of one drop gesture and display the resulting model.
#[tauri::command]
pub async fn load_files(
    files: Vec<DroppedFileInput>,
    state: tauri::State<'_, AppState>,
) -> Result<LoadReport, ViewerError> {
    load_files_inner(files, &state.session, &state.preferences).await
}

/// Flattened scene for the renderer.
#[tauri::command]
pub async fn get_scene(state: tauri::State<'_, AppState>) -> Result<SceneView, ViewerError> {
    state.session.scene_view()
}

/// Remove every model and restore the default lights.
#[tauri::command]
pub async fn reset_scene(state: tauri::State<'_, AppState>) -> Result<SceneView, ViewerError> {
    state.session.reset()
}

/// Export the scene as binary glTF.
#[tauri::command]
pub async fn export_scene(state: tauri::State<'_, AppState>) -> Result<Delivery, ViewerError> {
    state.session.export()
}

/// Recently loaded file names, newest first.
#[tauri::command]
pub async fn recent_files(state: tauri::State<'_, AppState>) -> Result<Vec<String>, ViewerError> {
    recent_files_inner(&state.preferences)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
