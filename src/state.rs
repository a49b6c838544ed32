//! Application state managed by Tauri.
//!
//! [`AppState`] is registered with `tauri::Builder::manage` and accessed from
//! command handlers via `tauri::State<AppState>`.

use std::collections::VecDeque;
use std::sync::RwLock;

use crate::config::ViewerConfig;
use crate::session::ViewerSession;

/// Longest recent-files list kept.
pub const MAX_RECENT_FILES: usize = 10;

/// In-memory user preferences.
///
/// No disk persistence; the list is rebuilt from scratch each session.
#[derive(Debug, Default)]
pub struct UserPreferences {
    /// Names of recently loaded files, newest first.
    pub recent_files: VecDeque<String>,
}

impl UserPreferences {
    /// Move `names` to the front of the list, dropping duplicates and
    /// anything beyond [`MAX_RECENT_FILES`].
    pub fn push_recent<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.recent_files.retain(|existing| existing != name);
            self.recent_files.push_front(name.to_string());
        }
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}

/// Root application state managed by Tauri.
///
/// The session guards its own view state; preferences sit behind an
/// [`RwLock`] so list queries do not block each other.
pub struct AppState {
    pub session: ViewerSession,
    pub preferences: RwLock<UserPreferences>,
}

impl AppState {
    pub fn new(config: &ViewerConfig) -> Self {
        Self::with_session(ViewerSession::with_defaults(config))
    }

    pub fn with_session(session: ViewerSession) -> Self {
        Self {
            session,
            preferences: RwLock::new(UserPreferences::default()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}
