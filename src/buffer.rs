//! Image buffers and generation-stamped image states.
//!
//! An [`ImageBuffer`] is produced by a collaborator (decoder or transform provider) and is never
//! mutated afterwards. Pixels live behind a shared allocation, so cloning a buffer is a refcount
//! bump and two clones compare as the same buffer under [`ImageBuffer::same_buffer`].

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pixel layout of an [`ImageBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
    Luma8,
    LumaA8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
            PixelFormat::LumaA8 => 2,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba8 | PixelFormat::LumaA8)
    }
}

/// Immutable pixel buffer
#[derive(Clone)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
}

impl ImageBuffer {
    /// Wrap raw pixel bytes. The length must match `width * height * bytes_per_pixel`.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidBuffer(format!(
                "zero-sized image ({}x{})",
                width, height
            )));
        }
        let data = data.into();
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| {
                DecodeError::InvalidBuffer(format!("image too large ({}x{})", width, height))
            })?;
        if data.len() != expected {
            return Err(DecodeError::InvalidBuffer(format!(
                "expected {} bytes for {}x{} {:?}, got {}",
                expected,
                width,
                height,
                format,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// True when both handles point at the same pixel allocation.
    pub fn same_buffer(&self, other: &ImageBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Session token. Bumped on every history reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Generation(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// An image buffer stamped with the generation it was created under
#[derive(Debug, Clone)]
pub struct ImageState {
    buffer: ImageBuffer,
    generation: Generation,
}

impl ImageState {
    pub fn new(buffer: ImageBuffer, generation: Generation) -> Self {
        Self { buffer, generation }
    }

    pub fn buffer(&self) -> &ImageBuffer {
        &self.buffer
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn into_buffer(self) -> ImageBuffer {
        self.buffer
    }

    /// Same generation and same pixel allocation.
    pub fn same_state(&self, other: &ImageState) -> bool {
        self.generation == other.generation && self.buffer.same_buffer(&other.buffer)
    }
}
