use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};

use crate::canvas::{CanvasError, Surface};

/// Extensions accepted as coloring-book pages.
pub const LINE_ART_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

fn encode_png<W: Write>(image: &RgbaImage, writer: W) -> Result<(), CanvasError> {
    PngEncoder::new(writer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| CanvasError::Encode(e.to_string()))
}

/// Encode the surface as a PNG byte stream. Pixels are written exactly as
/// stored; no colour management.
pub fn export_png(surface: &Surface) -> Result<Vec<u8>, CanvasError> {
    let image = surface.export_image();
    let mut bytes = Vec::new();
    encode_png(&image, &mut bytes)?;
    Ok(bytes)
}

/// Write the surface to `path` as PNG.
pub fn save_png(surface: &Surface, path: &Path) -> Result<(), CanvasError> {
    let image = surface.export_image();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_png(&image, &mut writer)?;
    writer.flush()?;
    crate::log_info!("Saved {}x{} PNG to {}", image.width(), image.height(), path.display());
    Ok(())
}

/// Decode an in-memory image (PNG/JPEG/BMP) into RGBA line-art.
pub fn decode_line_art(bytes: &[u8]) -> Result<RgbaImage, CanvasError> {
    let img = image::load_from_memory(bytes).map_err(|e| CanvasError::LoadFailed(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Read and decode a line-art file.
pub fn load_line_art(path: &Path) -> Result<RgbaImage, CanvasError> {
    let bytes = std::fs::read(path)
        .map_err(|e| CanvasError::LoadFailed(format!("{}: {}", path.display(), e)))?;
    decode_line_art(&bytes).inspect_err(|e| {
        crate::log_warn!("Line-art {} rejected: {}", path.display(), e);
    })
}
