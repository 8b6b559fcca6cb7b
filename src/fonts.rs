//! Embedded font data.
//!
//! DejaVu Sans Bold, used as the default watermark face. License text ships
//! alongside it in `assets/DejaVu-LICENSE`.

/// Bold sans-serif face for watermark text.
pub const WATERMARK_FONT: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");
