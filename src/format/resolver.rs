//! Drop set → loader pipeline selection.
//!
//! Selection is an ordered rule table: the first rule whose required
//! extensions are all present in the drop set wins. The order is a fixed
//! precedence, not validation; a drop carrying both `.obj` and `.glb`
//! resolves to [`FormatTag::Obj`].

use std::collections::BTreeSet;

use serde::Serialize;

use super::drop::{DropSet, DroppedFile};

/// Loader pipeline chosen for a drop set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormatTag {
    Obj,
    ObjMtl,
    Glb,
    Fbx,
    Kmz,
    Unsupported,
}

/// One row of the precedence table.
#[derive(Debug, Clone, Copy)]
struct Rule {
    requires: &'static [&'static str],
    tag: FormatTag,
}

/// Precedence table. `.obj` + `.mtl` must precede plain `.obj`.
const RULES: &[Rule] = &[
    Rule {
        requires: &[".obj", ".mtl"],
        tag: FormatTag::ObjMtl,
    },
    Rule {
        requires: &[".obj"],
        tag: FormatTag::Obj,
    },
    Rule {
        requires: &[".kmz"],
        tag: FormatTag::Kmz,
    },
    Rule {
        requires: &[".glb"],
        tag: FormatTag::Glb,
    },
    Rule {
        requires: &[".fbx"],
        tag: FormatTag::Fbx,
    },
];

/// Returned when no rule matches a drop set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("no loader for dropped files (extensions: {})", display_extensions(.extensions))]
pub struct UnsupportedDrop {
    /// Classified extensions found in the drop set, sorted.
    pub extensions: Vec<String>,
}

fn display_extensions(extensions: &[String]) -> String {
    if extensions.iter().all(String::is_empty) {
        "none".to_string()
    } else {
        extensions
            .iter()
            .filter(|e| !e.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Applies the precedence table, optionally without the KMZ rule.
#[derive(Debug, Clone, Copy)]
pub struct FormatResolver {
    kmz_enabled: bool,
}

impl Default for FormatResolver {
    fn default() -> Self {
        Self { kmz_enabled: true }
    }
}

impl FormatResolver {
    pub fn new(kmz_enabled: bool) -> Self {
        Self { kmz_enabled }
    }

    /// Pick the pipeline for `drop_set`.
    pub fn resolve(&self, drop_set: &DropSet) -> FormatTag {
        let exts = drop_set.extensions();
        self.resolve_extensions(&exts)
    }

    fn resolve_extensions(&self, exts: &BTreeSet<String>) -> FormatTag {
        RULES
            .iter()
            .filter(|rule| self.kmz_enabled || rule.tag != FormatTag::Kmz)
            .find(|rule| rule.requires.iter().all(|ext| exts.contains(*ext)))
            .map_or(FormatTag::Unsupported, |rule| rule.tag)
    }

    /// Resolve `drop_set` and bind the files the chosen pipeline needs.
    pub fn plan(&self, drop_set: &DropSet) -> Result<LoadPlan, UnsupportedDrop> {
        let tag = self.resolve(drop_set);
        tracing::debug!(?tag, files = drop_set.len(), "resolved drop set");
        LoadPlan::new(tag, drop_set).ok_or_else(|| UnsupportedDrop {
            extensions: drop_set.extensions().into_iter().collect(),
        })
    }
}

/// Resolve with the default rule table (KMZ enabled).
pub fn resolve(drop_set: &DropSet) -> FormatTag {
    FormatResolver::default().resolve(drop_set)
}

/// Typed inputs for one loader pipeline.
///
/// Each variant carries exactly the files its pipeline reads, selected by
/// classified extension so the order of the drop set never matters.
#[derive(Debug, Clone)]
pub enum LoadPlan {
    Obj { obj: DroppedFile },
    ObjMtl { obj: DroppedFile, mtl: DroppedFile },
    Glb { glb: DroppedFile },
    Fbx { fbx: DroppedFile },
    Kmz { kmz: DroppedFile },
}

impl LoadPlan {
    /// Bind files for `tag`. Returns `None` for [`FormatTag::Unsupported`] or
    /// when the drop set lacks a file the tag requires.
    pub fn new(tag: FormatTag, drop_set: &DropSet) -> Option<Self> {
        let pick = |ext: &str| drop_set.find(ext).cloned();
        match tag {
            FormatTag::ObjMtl => Some(Self::ObjMtl {
                obj: pick(".obj")?,
                mtl: pick(".mtl")?,
            }),
            FormatTag::Obj => Some(Self::Obj { obj: pick(".obj")? }),
            FormatTag::Glb => Some(Self::Glb { glb: pick(".glb")? }),
            FormatTag::Fbx => Some(Self::Fbx { fbx: pick(".fbx")? }),
            FormatTag::Kmz => Some(Self::Kmz { kmz: pick(".kmz")? }),
            FormatTag::Unsupported => None,
        }
    }

    pub fn tag(&self) -> FormatTag {
        match self {
            Self::Obj { .. } => FormatTag::Obj,
            Self::ObjMtl { .. } => FormatTag::ObjMtl,
            Self::Glb { .. } => FormatTag::Glb,
            Self::Fbx { .. } => FormatTag::Fbx,
            Self::Kmz { .. } => FormatTag::Kmz,
        }
    }

    /// Name of the file that carries the geometry.
    pub fn primary_name(&self) -> &str {
        match self {
            Self::Obj { obj } | Self::ObjMtl { obj, .. } => &obj.name,
            Self::Glb { glb } => &glb.name,
            Self::Fbx { fbx } => &fbx.name,
            Self::Kmz { kmz } => &kmz.name,
        }
    }
}
