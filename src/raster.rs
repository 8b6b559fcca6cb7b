//! Decoded source images.

use std::sync::Arc;

use image::RgbaImage;

use crate::error::{Error, Result};

/// A decoded image whose pixels never change after construction.
///
/// Cloning is cheap: the pixel buffer is shared, so the same original can be
/// read from several threads at once.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: Arc<RgbaImage>,
}

impl RasterImage {
    /// Wrap an already decoded buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyImage`] if either dimension is zero.
    pub fn new(pixels: RgbaImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage { width, height });
        }
        Ok(Self {
            pixels: Arc::new(pixels),
        })
    }

    /// Decode an encoded image (PNG, JPEG, WebP, BMP, ...) from memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a supported image, or
    /// [`Error::EmptyImage`] if the decoded image has no pixels.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).map_err(Error::Decode)?;
        Self::new(img.to_rgba8())
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// The decoded pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
