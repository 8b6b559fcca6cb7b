//! Serialization of composited images.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Prefix added to the original file name of every exported image.
pub const EXPORT_PREFIX: &str = "watermarked_";

/// Encoded output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Lossless PNG, alpha preserved.
    #[default]
    Png,
    /// JPEG at quality 100, alpha dropped.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
    /// Lossless WebP.
    WebP,
}

impl ExportFormat {
    /// MIME type of the encoded bytes.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Bmp => "image/bmp",
            ExportFormat::WebP => "image/webp",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::Bmp => "bmp",
            ExportFormat::WebP => "webp",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            "bmp" => Ok(ExportFormat::Bmp),
            "webp" => Ok(ExportFormat::WebP),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Turns a composited raster into bytes.
///
/// Implementations must be deterministic: identical pixels give identical
/// bytes.
pub trait RasterEncoder: Sync {
    /// Encode `raster`.
    ///
    /// # Errors
    ///
    /// Returns an error if the raster cannot be represented in the output
    /// format.
    fn encode(&self, raster: &RgbaImage) -> Result<Vec<u8>>;
}

/// Encoder for the standard portable formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportEncoder {
    format: ExportFormat,
}

impl ExportEncoder {
    /// Encoder writing `format`.
    #[must_use]
    pub const fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// The configured output format.
    #[must_use]
    pub const fn format(&self) -> ExportFormat {
        self.format
    }
}

impl RasterEncoder for ExportEncoder {
    fn encode(&self, raster: &RgbaImage) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        match self.format {
            ExportFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 100);
                encoder.encode_image(&rgb).map_err(Error::Encode)?;
            }
            ExportFormat::Png => raster
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(Error::Encode)?,
            ExportFormat::Bmp => raster
                .write_to(&mut buf, ImageFormat::Bmp)
                .map_err(Error::Encode)?,
            ExportFormat::WebP => raster
                .write_to(&mut buf, ImageFormat::WebP)
                .map_err(Error::Encode)?,
        }
        Ok(buf.into_inner())
    }
}

/// Download name for an exported image: the original name with
/// [`EXPORT_PREFIX`] in front, extension untouched.
#[must_use]
pub fn suggest_file_name(original: &str) -> String {
    format!("{EXPORT_PREFIX}{original}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(16, 9, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([(x * 15) as u8, (y * 28) as u8, 77, 200])
        })
    }

    #[test]
    fn suggest_file_name_prefixes_original() {
        assert_eq!(suggest_file_name("dni.jpg"), "watermarked_dni.jpg");
        assert_eq!(suggest_file_name("scan"), "watermarked_scan");
    }

    #[test]
    fn png_round_trips_pixels_and_alpha() {
        let img = sample();
        let bytes = ExportEncoder::default().encode(&img).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn every_format_is_deterministic() {
        let img = sample();
        for format in [
            ExportFormat::Png,
            ExportFormat::Jpeg,
            ExportFormat::Bmp,
            ExportFormat::WebP,
        ] {
            let encoder = ExportEncoder::new(format);
            let a = encoder.encode(&img).unwrap();
            let b = encoder.encode(&img).unwrap();
            assert!(!a.is_empty());
            assert_eq!(a, b, "{format} output differs between runs");
            assert_eq!(
                image::guess_format(&a).unwrap(),
                match format {
                    ExportFormat::Png => ImageFormat::Png,
                    ExportFormat::Jpeg => ImageFormat::Jpeg,
                    ExportFormat::Bmp => ImageFormat::Bmp,
                    ExportFormat::WebP => ImageFormat::WebP,
                }
            );
        }
    }

    #[test]
    fn format_parses_common_names() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!("jpg".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!("webp".parse::<ExportFormat>().unwrap(), ExportFormat::WebP);
        assert!("tiff".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Jpeg.mime_type(), "image/jpeg");
    }
}
