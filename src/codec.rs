//! Image decoder collaborator and PNG helpers built on the `image` crate.

use crate::buffer::{ImageBuffer, PixelFormat};
use crate::error::{DecodeError, EditError};
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder};
use std::path::Path;

/// Turns a file into an [`ImageBuffer`]. Used once per import.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<ImageBuffer, DecodeError>;
}

/// Decodes any format the `image` crate recognizes from its content.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<ImageBuffer, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        decode_bytes(&bytes)
    }
}

pub fn decode_bytes(bytes: &[u8]) -> Result<ImageBuffer, DecodeError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    from_dynamic(image)
}

/// Keep 8-bit layouts as they are; everything else is widened to RGBA8.
pub fn from_dynamic(image: DynamicImage) -> Result<ImageBuffer, DecodeError> {
    let (width, height) = (image.width(), image.height());
    let (format, raw) = match image {
        DynamicImage::ImageRgba8(img) => (PixelFormat::Rgba8, img.into_raw()),
        DynamicImage::ImageRgb8(img) => (PixelFormat::Rgb8, img.into_raw()),
        DynamicImage::ImageLuma8(img) => (PixelFormat::Luma8, img.into_raw()),
        DynamicImage::ImageLumaA8(img) => (PixelFormat::LumaA8, img.into_raw()),
        other => (PixelFormat::Rgba8, other.to_rgba8().into_raw()),
    };
    ImageBuffer::new(width, height, format, raw)
}

fn color_type(format: PixelFormat) -> ColorType {
    match format {
        PixelFormat::Rgba8 => ColorType::Rgba8,
        PixelFormat::Rgb8 => ColorType::Rgb8,
        PixelFormat::Luma8 => ColorType::L8,
        PixelFormat::LumaA8 => ColorType::La8,
    }
}

pub fn encode_png(buffer: &ImageBuffer) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            buffer.data(),
            buffer.width(),
            buffer.height(),
            color_type(buffer.format()),
        )
        .map_err(|e| DecodeError::Unsupported(format!("PNG encoding failed: {}", e)))?;
    Ok(out)
}

pub fn save_png(buffer: &ImageBuffer, path: &Path) -> Result<(), EditError> {
    let bytes = encode_png(buffer)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
