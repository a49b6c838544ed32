//! Camera command handlers. The frontend calls [`tick`] once per animation
//! frame and draws with the returned view.

use crate::camera::{CameraView, OrbitInput};
use crate::error::ViewerError;
use crate::state::AppState;

/// Advance auto-rotation by `dt` seconds.
#[tauri::command]
pub async fn tick(
    dt: f32,
    state: tauri::State<'_, AppState>,
) -> Result<CameraView, ViewerError> {
    state.session.tick(dt)
}

/// Viewport size changed; updates the aspect ratio only.
#[tauri::command]
pub async fn resize_viewport(
    width: u32,
    height: u32,
    state: tauri::State<'_, AppState>,
) -> Result<CameraView, ViewerError> {
    state.session.resize(width, height)
}

/// Apply one rotate or zoom gesture.
#[tauri::command]
pub async fn orbit_camera(
    input: OrbitInput,
    state: tauri::State<'_, AppState>,
) -> Result<CameraView, ViewerError> {
    state.session.orbit(input)
}

/// Return to the pose chosen by the last framing.
#[tauri::command]
pub async fn reset_view(state: tauri::State<'_, AppState>) -> Result<CameraView, ViewerError> {
    state.session.reset_view()
}
