//! KMZ archives: a zipped KML document referencing a COLLADA model.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use super::{collada, LoadError, SceneAsset};

const KML_ENTRY: &str = "doc.kml";

/// Open the archive, locate the model and parse it as COLLADA.
///
/// The model is the first `<Model><Link><href>` in `doc.kml` when that
/// entry exists in the archive, otherwise the first `.dae` entry.
pub fn parse_kmz(bytes: &[u8], name: &str) -> Result<SceneAsset, LoadError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| LoadError::parse("KMZ", name, e))?;

    let entry = locate_model(&mut archive)
        .ok_or_else(|| LoadError::parse("KMZ", name, "archive contains no COLLADA model"))?;
    tracing::debug!(archive = %name, model = %entry, "located KMZ model");

    let text = read_entry(&mut archive, &entry).map_err(|e| LoadError::parse("KMZ", name, e))?;
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let scene = collada::parse_collada(&text, stem)
        .map_err(|e| LoadError::parse("KMZ", name, format!("{entry}: {e}")))?;

    Ok(SceneAsset {
        scene,
        scene_count: 1,
    })
}

fn locate_model<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    let from_kml = read_entry(archive, KML_ENTRY)
        .ok()
        .and_then(|kml| model_href(&kml))
        .map(|href| href.trim_start_matches("./").to_string())
        .filter(|href| archive.file_names().any(|n| n == href.as_str()));

    from_kml.or_else(|| {
        archive
            .file_names()
            .find(|n| n.to_ascii_lowercase().ends_with(".dae"))
            .map(str::to_string)
    })
}

fn model_href(kml: &str) -> Option<String> {
    let document = roxmltree::Document::parse(kml).ok()?;
    let named = |node: &roxmltree::Node<'_, '_>, name: &str| {
        node.is_element() && node.tag_name().name() == name
    };
    let href = document
        .descendants()
        .find(|n| named(n, "Model"))?
        .children()
        .find(|n| named(n, "Link"))?
        .children()
        .find(|n| named(n, "href"))?;
    Some(href.text()?.trim().to_string()).filter(|h| !h.is_empty())
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    entry: &str,
) -> Result<String, String> {
    let mut file = archive.by_name(entry).map_err(|e| format!("{entry}: {e}"))?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| format!("{entry}: {e}"))?;
    Ok(text)
}
