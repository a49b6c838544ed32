//! Tauri IPC command handlers.
//!
//! Sub-modules are grouped by concern:
//! - [`viewer`]: load dropped files, scene snapshot, reset, export, recents
//! - [`camera`]: frame ticks, viewport resize, orbit input, view reset
//!
//! All handlers follow the `_inner` + `#[tauri::command]` wrapper pattern:
//! the `_inner` function holds the logic and is testable without Tauri.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ViewerError;
use crate::state::UserPreferences;

pub mod camera;
pub mod viewer;

pub(crate) fn read_preferences(
    lock: &RwLock<UserPreferences>,
) -> Result<RwLockReadGuard<'_, UserPreferences>, ViewerError> {
    lock.read()
        .map_err(|_| ViewerError::Io("preferences lock poisoned".to_string()))
}

pub(crate) fn write_preferences(
    lock: &RwLock<UserPreferences>,
) -> Result<RwLockWriteGuard<'_, UserPreferences>, ViewerError> {
    lock.write()
        .map_err(|_| ViewerError::Io("preferences lock poisoned".to_string()))
}
