fn main() {
    // Tauri-generated build configuration (reads tauri.conf.json and the
    // capability files under capabilities/).
    tauri_build::build();
}
