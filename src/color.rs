//! Brush palette and color parsing.

use std::fmt;
use std::str::FromStr;

use image::Rgba;

use crate::error::{Error, Result};

/// Default watermark fill, a strong red.
pub const DEFAULT_WATERMARK_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Colors available for censoring strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrushColor {
    /// `#000000`
    #[default]
    Black,
    /// `#ffffff`
    White,
    /// `#dedede`, the background gray of a national ID card.
    Gray,
}

impl BrushColor {
    /// Every brush color, in palette order.
    pub const ALL: [BrushColor; 3] = [BrushColor::Black, BrushColor::White, BrushColor::Gray];

    /// Opaque pixel value painted by this brush.
    #[must_use]
    pub fn rgba(self) -> Rgba<u8> {
        match self {
            BrushColor::Black => Rgba([0x00, 0x00, 0x00, 0xff]),
            BrushColor::White => Rgba([0xff, 0xff, 0xff, 0xff]),
            BrushColor::Gray => Rgba([0xde, 0xde, 0xde, 0xff]),
        }
    }

    /// Lowercase palette name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BrushColor::Black => "black",
            BrushColor::White => "white",
            BrushColor::Gray => "gray",
        }
    }
}

impl fmt::Display for BrushColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BrushColor {
    type Err = Error;

    /// Accepts a palette name (`black`, `white`, `gray`/`grey`) or the exact
    /// hex value of a palette entry.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black" => return Ok(BrushColor::Black),
            "white" => return Ok(BrushColor::White),
            "gray" | "grey" => return Ok(BrushColor::Gray),
            _ => {}
        }
        let rgba = parse_hex_color(s)?;
        BrushColor::ALL
            .into_iter()
            .find(|b| b.rgba() == rgba)
            .ok_or_else(|| Error::InvalidColor(s.to_string()))
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
///
/// # Errors
///
/// Returns [`Error::InvalidColor`] for any other shape or non-hex digits.
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>> {
    let invalid = || Error::InvalidColor(s.to_string());
    let hex = s.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.is_ascii() {
        return Err(invalid());
    }

    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut out = [0u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)?;
                #[allow(clippy::cast_possible_truncation)]
                {
                    out[i] = (v * 17) as u8;
                }
            }
            out[3] = 255;
            Ok(Rgba(out))
        }
        6 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => Err(invalid()),
    }
}
