//! Format detection for dropped files.
//!
//! ```text
//! format/
//! ├── extension.rs: file name → lowercase extension
//! ├── drop.rs     : dropped files and their loadable handles
//! └── resolver.rs : ordered rule table → FormatTag / LoadPlan
//! ```

pub mod drop;
pub mod extension;
pub mod resolver;

pub use drop::{DropSet, DroppedFile, FileHandle};
pub use extension::classify;
pub use resolver::{resolve, FormatResolver, FormatTag, LoadPlan, UnsupportedDrop};
