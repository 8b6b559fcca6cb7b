//! Error types for the docstamp crate.

/// Errors that can occur while loading, editing or exporting images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input bytes could not be decoded as a raster image.
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    /// The decoded image has no pixels.
    #[error("image has zero area ({width}x{height})")]
    EmptyImage {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// A color string is not a recognized name or hex value.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// The font data could not be parsed.
    #[error("invalid font data")]
    InvalidFont,

    /// A stroke description could not be parsed.
    #[error("invalid stroke: {0}")]
    InvalidStroke(String),

    /// The requested output format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Encoding the composited image failed.
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let color = Error::InvalidColor("#12".to_string());
        assert!(color.to_string().contains("#12"));

        let empty = Error::EmptyImage {
            width: 0,
            height: 20,
        };
        assert!(empty.to_string().contains("0x20"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let stroke = Error::InvalidStroke("expected x,y".to_string());
        assert!(stroke.to_string().contains("expected x,y"));
    }
}
