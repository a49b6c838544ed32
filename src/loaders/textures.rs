//! Texture decoders selected by file-name pattern.
//!
//! Materials reference textures by file name. The registry picks a decoder
//! by matching that name against registered patterns in registration order,
//! falling back to a generic decoder that sniffs the image format. Every
//! decoded texture is re-encoded as PNG so the renderer and the GLB exporter
//! share one representation.

use std::path::Path;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat, RgbaImage};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::scene::Texture;

static DDS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.dds$").expect("Invalid DDS pattern regex"));
static TGA_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.tga$").expect("Invalid TGA pattern regex"));

/// Decodes raw texture file bytes into RGBA8 pixels.
pub trait TextureDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, String>;
}

/// Decoder for one fixed container format.
#[derive(Debug, Clone, Copy)]
pub struct FormatDecoder(pub ImageFormat);

impl TextureDecoder for FormatDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, String> {
        image::load_from_memory_with_format(bytes, self.0)
            .map(|img| img.to_rgba8())
            .map_err(|e| e.to_string())
    }
}

/// Decoder that guesses the format from the bytes.
#[derive(Debug, Clone, Copy)]
pub struct SniffingDecoder;

impl TextureDecoder for SniffingDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, String> {
        image::load_from_memory(bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| e.to_string())
    }
}

/// Ordered pattern → decoder registry with a generic fallback.
pub struct TextureHandlers {
    handlers: Vec<(Regex, Arc<dyn TextureDecoder>)>,
    fallback: Arc<dyn TextureDecoder>,
}

impl TextureHandlers {
    /// Registry with no patterns; every name uses the fallback decoder.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: Arc::new(SniffingDecoder),
        }
    }

    /// Register `decoder` for names matching `pattern`. Earlier
    /// registrations win.
    pub fn add_handler(&mut self, pattern: Regex, decoder: Arc<dyn TextureDecoder>) -> &mut Self {
        self.handlers.push((pattern, decoder));
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Decoder for a texture referenced as `name`.
    pub fn decoder_for(&self, name: &str) -> &dyn TextureDecoder {
        self.handlers
            .iter()
            .find(|(pattern, _)| pattern.is_match(name))
            .map(|(_, decoder)| decoder.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    /// Decode `bytes` referenced as `name` into a PNG-backed texture.
    pub fn load(&self, name: &str, bytes: &[u8]) -> Result<Texture, String> {
        let pixels = self.decoder_for(name).decode(bytes)?;
        encode_png(name, &pixels)
    }

    /// Read and decode a texture file.
    pub fn load_file(&self, path: &Path) -> Result<Texture, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.load(&name, &bytes)
    }
}

impl Default for TextureHandlers {
    /// DDS and TGA get dedicated decoders; everything else is sniffed.
    fn default() -> Self {
        let mut handlers = Self::empty();
        handlers
            .add_handler(DDS_PATTERN.clone(), Arc::new(FormatDecoder(ImageFormat::Dds)))
            .add_handler(TGA_PATTERN.clone(), Arc::new(FormatDecoder(ImageFormat::Tga)));
        handlers
    }
}

/// PNG-encode RGBA8 pixels into a [`Texture`].
pub fn encode_png(source: &str, pixels: &RgbaImage) -> Result<Texture, String> {
    let (width, height) = pixels.dimensions();
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(pixels.as_raw(), width, height, image::ColorType::Rgba8)
        .map_err(|e| e.to_string())?;
    Ok(Texture {
        source: source.to_string(),
        width,
        height,
        png,
    })
}
