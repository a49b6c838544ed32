pub mod camera;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod loaders;
pub mod scene;
pub mod session;
pub mod state;

use state::AppState;

/// modelview Tauri application library entry point.
///
/// All Tauri builder setup lives here so it can be tested and referenced
/// by the thin `main.rs` binary wrapper.
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // ── Tracing setup (must happen before anything else) ────────────────────
    //
    // Logs are written to a single file in the OS data dir:
    //   Linux    ~/.local/share/modelview/modelview.log
    //   macOS    ~/Library/Application Support/modelview/modelview.log
    //   Windows  %LOCALAPPDATA%\modelview\modelview.log
    //
    // Log level is controlled by the RUST_LOG environment variable;
    // defaults to INFO when the variable is absent.
    let log_dir = dirs::data_local_dir()
        .unwrap_or_default()
        .join("modelview");

    // tracing_appender::rolling::never panics if it cannot open the log file,
    // so the directory tree is created first.
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::never(&log_dir, "modelview.log");
    let (non_blocking, _tracing_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "modelview starting");

    // ── Configuration and application state ─────────────────────────────────
    let config = config::load_or_default();
    let state = AppState::new(&config);

    // ── Tauri builder ────────────────────────────────────────────────────────
    tauri::Builder::default()
        .manage(state)
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            commands::viewer::load_files,
            commands::viewer::get_scene,
            commands::viewer::reset_scene,
            commands::viewer::export_scene,
            commands::viewer::recent_files,
            commands::camera::tick,
            commands::camera::resize_viewport,
            commands::camera::orbit_camera,
            commands::camera::reset_view,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
