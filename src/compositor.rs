//! Diagonal watermark compositing.
//!
//! The watermark text is sized so its straight-line width covers 80% of the
//! image diagonal, then drawn centered and rotated to run from the bottom-left
//! corner towards the top-right one:
//!
//! 1. `diagonal = sqrt(w^2 + h^2)`, `angle = atan2(h, w)`
//! 2. measure the text at 100px and scale the size by `0.8 * diagonal / width`
//! 3. clamp the size to `[max(12, w/40), h/3]`
//! 4. rasterize the text into a coverage mask, rotate it by `-angle` about the
//!    image center, and blend the fill color at the requested opacity

use std::path::Path;

use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::color::DEFAULT_WATERMARK_COLOR;
use crate::error::{Error, Result};
use crate::fonts;

/// Text stamped when the user leaves the field empty.
pub const DEFAULT_WATERMARK_TEXT: &str = "COPIA DNI";

/// Size the text is first measured at.
pub const REFERENCE_FONT_SIZE: f32 = 100.0;

/// Fraction of the image diagonal the text should span.
pub const DIAGONAL_FILL_RATIO: f32 = 0.8;

/// Absolute lower bound for the font size.
pub const MIN_FONT_SIZE: f32 = 12.0;

/// Watermark parameters shared by every image of an export batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    /// Text to stamp.
    pub text: String,
    /// Global alpha of the fill, `0.0..=1.0`.
    pub opacity: f32,
    /// Fill color.
    pub color: Rgba<u8>,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: DEFAULT_WATERMARK_TEXT.to_string(),
            opacity: 0.5,
            color: DEFAULT_WATERMARK_COLOR,
        }
    }
}

impl WatermarkSpec {
    /// Set the text, falling back to [`DEFAULT_WATERMARK_TEXT`] when empty.
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = if text.is_empty() {
            DEFAULT_WATERMARK_TEXT.to_string()
        } else {
            text.to_string()
        };
        self
    }

    /// Set the opacity from a 0-100 percentage. Values above 100 saturate.
    #[must_use]
    pub fn with_opacity_percent(mut self, percent: u8) -> Self {
        self.opacity = f32::from(percent.min(100)) / 100.0;
        self
    }

    /// Set the fill color.
    #[must_use]
    pub fn with_color(mut self, color: Rgba<u8>) -> Self {
        self.color = color;
        self
    }
}

/// Geometry and font size chosen for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    /// Length of the image diagonal in pixels.
    pub diagonal: f32,
    /// Angle of the diagonal in radians, `atan2(h, w)`.
    pub angle: f32,
    /// Advance width of the text at [`REFERENCE_FONT_SIZE`].
    pub reference_width: f32,
    /// Proportionally scaled size before clamping.
    pub unclamped_size: f32,
    /// Final font size in pixels.
    pub font_size: f32,
}

/// Choose the watermark font size for a `width` x `height` image.
///
/// When the text has no measurable width the reference size is kept and only
/// the clamp applies. The upper bound is `h/3` alone; if it falls below the
/// lower bound, the upper bound wins.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fit_font_size<F: Font>(font: &F, text: &str, width: u32, height: u32) -> FontFit {
    let (w, h) = (width as f32, height as f32);
    let diagonal = w.hypot(h);
    let angle = h.atan2(w);

    let reference_width = measure_text_width(font, REFERENCE_FONT_SIZE, text);
    let unclamped_size = if reference_width > 0.0 {
        (REFERENCE_FONT_SIZE * (diagonal * DIAGONAL_FILL_RATIO / reference_width)).floor()
    } else {
        REFERENCE_FONT_SIZE
    };

    let min_size = MIN_FONT_SIZE.max(w / 40.0);
    let font_size = unclamped_size.max(min_size).min(h / 3.0);

    FontFit {
        diagonal,
        angle,
        reference_width,
        unclamped_size,
        font_size,
    }
}

/// Advance width of `text` on a single line at `size` pixels, kerning included.
#[must_use]
pub fn measure_text_width<F: Font>(font: &F, size: f32, text: &str) -> f32 {
    layout_line(font, size, text).1
}

/// Scale whose em square is `size` pixels tall.
fn em_scale<F: Font>(font: &F, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(units) if units > 0.0 => PxScale::from(size * font.height_unscaled() / units),
        _ => PxScale::from(size),
    }
}

/// Position glyphs left to right on a baseline at `y = 0`.
fn layout_line<F: Font>(font: &F, size: f32, text: &str) -> (Vec<Glyph>, f32) {
    let scale = em_scale(font, size);
    let scaled = font.as_scaled(scale);

    let mut glyphs = Vec::with_capacity(text.len());
    let mut caret = 0.0_f32;
    let mut prev = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scale, point(caret, 0.0)));
        caret += scaled.h_advance(id);
        prev = Some(id);
    }
    (glyphs, caret)
}

/// Rasterized text plus the point of the mask that should land on the image
/// center.
struct TextMask {
    coverage: GrayImage,
    anchor_x: f32,
    anchor_y: f32,
}

/// Renders diagonal watermarks with a fixed font.
///
/// Create once and reuse; it is `Send + Sync`, so one compositor can serve a
/// whole batch in parallel.
#[derive(Clone)]
pub struct WatermarkCompositor {
    font: FontArc,
}

impl std::fmt::Debug for WatermarkCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkCompositor").finish_non_exhaustive()
    }
}

impl WatermarkCompositor {
    /// Create a compositor using the embedded bold sans-serif face.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFont`] if the embedded font cannot be parsed.
    pub fn new() -> Result<Self> {
        let font = FontArc::try_from_slice(fonts::WATERMARK_FONT).map_err(|_| Error::InvalidFont)?;
        Ok(Self { font })
    }

    /// Create a compositor from TrueType/OpenType font bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFont`] if the data is not a usable font.
    pub fn from_font_data(data: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(data).map_err(|_| Error::InvalidFont)?;
        Ok(Self { font })
    }

    /// Create a compositor from a font file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or
    /// [`Error::InvalidFont`] if it is not a usable font.
    pub fn from_font_file(path: &Path) -> Result<Self> {
        Self::from_font_data(std::fs::read(path)?)
    }

    /// Font size and geometry that [`compose`](Self::compose) would use.
    #[must_use]
    pub fn fit(&self, text: &str, width: u32, height: u32) -> FontFit {
        fit_font_size(&self.font, text, width, height)
    }

    /// Advance width of `text` at `size` pixels.
    #[must_use]
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        measure_text_width(&self.font, size, text)
    }

    /// Stamp the watermark onto a copy of `working`.
    ///
    /// `working` is only read. The result is deterministic for identical
    /// inputs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compose(&self, working: &RgbaImage, spec: &WatermarkSpec) -> RgbaImage {
        let mut out = working.clone();
        let (width, height) = out.dimensions();
        if width == 0 || height == 0 {
            return out;
        }

        let fit = self.fit(&spec.text, width, height);
        tracing::debug!(
            width,
            height,
            font_size = fit.font_size,
            unclamped = fit.unclamped_size,
            angle = fit.angle,
            "fitted watermark text"
        );

        let Some(mask) = self.render_mask(&spec.text, fit.font_size) else {
            return out;
        };

        let projection = Projection::translate(-mask.anchor_x, -mask.anchor_y)
            .and_then(Projection::rotate(-fit.angle))
            .and_then(Projection::translate(width as f32 / 2.0, height as f32 / 2.0));

        let mut coverage = GrayImage::new(width, height);
        warp_into(
            &mask.coverage,
            &projection,
            Interpolation::Bilinear,
            Luma([0]),
            &mut coverage,
        );

        blend_fill(&mut out, &coverage, spec.color, spec.opacity);
        out
    }

    /// Rasterize `text` unrotated. `None` when nothing would be drawn.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn render_mask(&self, text: &str, size: f32) -> Option<TextMask> {
        let (glyphs, advance) = layout_line(&self.font, size, text);
        let outlined: Vec<_> = glyphs
            .into_iter()
            .filter_map(|g| self.font.outline_glyph(g))
            .collect();

        let first = outlined.first()?.px_bounds();
        let (mut min_x, mut min_y, mut max_x, mut max_y) =
            (first.min.x, first.min.y, first.max.x, first.max.y);
        for g in &outlined[1..] {
            let b = g.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }

        let mask_w = (max_x - min_x).ceil() as u32;
        let mask_h = (max_y - min_y).ceil() as u32;
        if mask_w == 0 || mask_h == 0 {
            return None;
        }

        let mut coverage = GrayImage::new(mask_w, mask_h);
        for glyph in &outlined {
            let b = glyph.px_bounds();
            let off_x = (b.min.x - min_x) as u32;
            let off_y = (b.min.y - min_y) as u32;
            glyph.draw(|gx, gy, c| {
                let (x, y) = (off_x + gx, off_y + gy);
                if x < mask_w && y < mask_h {
                    let v = (c * 255.0).round().clamp(0.0, 255.0) as u8;
                    let px = coverage.get_pixel_mut(x, y);
                    px[0] = px[0].max(v);
                }
            });
        }

        let scaled = self.font.as_scaled(em_scale(&self.font, size));
        let middle = -(scaled.ascent() + scaled.descent()) / 2.0;
        Some(TextMask {
            coverage,
            anchor_x: advance / 2.0 - min_x,
            anchor_y: middle - min_y,
        })
    }
}

/// Source-over blend of `color` through `coverage` at global `opacity`.
///
/// Channels are non-premultiplied, so the destination color is weighted by
/// its own alpha before mixing.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_fill(out: &mut RgbaImage, coverage: &GrayImage, color: Rgba<u8>, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0) * f32::from(color[3]) / 255.0;
    if opacity <= 0.0 {
        return;
    }

    for (dst, cov) in out.pixels_mut().zip(coverage.pixels()) {
        if cov[0] == 0 {
            continue;
        }
        let a = f32::from(cov[0]) / 255.0 * opacity;
        let dst_a = f32::from(dst[3]) / 255.0;
        let under = dst_a * (1.0 - a);
        let out_a = a + under;
        if out_a <= 0.0 {
            continue;
        }
        for ch in 0..3 {
            let v = (f32::from(color[ch]) * a + f32::from(dst[ch]) * under) / out_a;
            dst[ch] = v.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn compositor() -> WatermarkCompositor {
        WatermarkCompositor::new().unwrap()
    }

    fn changed_in(out: &RgbaImage, base: Rgba<u8>, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> usize {
        let mut n = 0;
        for y in ys {
            for x in xs.clone() {
                if *out.get_pixel(x, y) != base {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn fit_for_800x600() {
        let c = compositor();
        let fit = c.fit(DEFAULT_WATERMARK_TEXT, 800, 600);

        assert!((fit.diagonal - 1000.0).abs() < 1e-3);
        assert!((fit.angle - 0.6435).abs() < 1e-4);
        assert!(fit.font_size <= 200.0);
        assert!(fit.font_size >= 20.0);
    }

    #[test]
    fn unclamped_width_targets_eighty_percent_of_diagonal() {
        let c = compositor();
        for (w, h) in [(800, 600), (1920, 1080), (600, 800), (3000, 400), (123, 457)] {
            for text in [DEFAULT_WATERMARK_TEXT, "X", "CONFIDENTIAL COPY"] {
                let fit = c.fit(text, w, h);
                let target = fit.diagonal * DIAGONAL_FILL_RATIO;
                let width = c.measure(text, fit.unclamped_size);
                // Flooring the size loses at most one pixel of font size.
                let tolerance = fit.reference_width / REFERENCE_FONT_SIZE + 0.5;
                assert!(
                    (width - target).abs() <= tolerance,
                    "{w}x{h} {text:?}: width {width} vs target {target}"
                );
            }
        }
    }

    #[test]
    fn final_size_respects_clamp() {
        let c = compositor();
        for (w, h) in [
            (800, 600),
            (100, 100),
            (40, 40),
            (1920, 1080),
            (300, 2000),
            (4000, 300),
            (64, 4000),
        ] {
            for text in [DEFAULT_WATERMARK_TEXT, "", "i", "A MUCH LONGER WATERMARK TEXT"] {
                let fit = c.fit(text, w, h);
                let lower = MIN_FONT_SIZE.max(w as f32 / 40.0);
                let upper = h as f32 / 3.0;
                assert!(fit.font_size <= upper, "{w}x{h} {text:?}: {fit:?}");
                assert!(fit.font_size >= lower, "{w}x{h} {text:?}: {fit:?}");
            }
        }
    }

    #[test]
    fn upper_bound_wins_when_bounds_cross() {
        // w/40 = 125 exceeds h/3 = 100.
        let fit = compositor().fit(DEFAULT_WATERMARK_TEXT, 5000, 300);
        assert!((fit.font_size - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn width_over_five_is_not_an_upper_bound() {
        // Tall narrow image: the fitted size exceeds w/5 and is kept.
        let fit = compositor().fit(DEFAULT_WATERMARK_TEXT, 1000, 3000);
        assert!(fit.font_size > 200.0, "{fit:?}");
        assert!(fit.font_size <= 1000.0);
    }

    #[test]
    fn empty_text_keeps_reference_size() {
        let c = compositor();
        let fit = c.fit("", 800, 600);
        assert!(fit.reference_width.abs() < f32::EPSILON);
        assert!((fit.unclamped_size - REFERENCE_FONT_SIZE).abs() < f32::EPSILON);
        assert!((fit.font_size - REFERENCE_FONT_SIZE).abs() < f32::EPSILON);

        let base = RgbaImage::from_pixel(80, 60, WHITE);
        let spec = WatermarkSpec {
            text: String::new(),
            ..WatermarkSpec::default()
        };
        assert_eq!(c.compose(&base, &spec), base);
    }

    #[test]
    fn compose_leaves_input_untouched_and_stamps_output() {
        let c = compositor();
        let base = RgbaImage::from_pixel(400, 300, WHITE);
        let snapshot = base.clone();
        let spec = WatermarkSpec::default().with_opacity_percent(100);

        let out = c.compose(&base, &spec);

        assert_eq!(base, snapshot);
        assert_eq!(out.dimensions(), base.dimensions());
        assert!(out.pixels().any(|p| p[0] == 255 && p[1] < 64 && p[2] < 64));
        // Text spans 80% of the diagonal, so the corners stay clean.
        assert_eq!(out.get_pixel(0, 0), &WHITE);
        assert_eq!(out.get_pixel(399, 299), &WHITE);
    }

    #[test]
    fn text_runs_from_bottom_left_to_top_right() {
        let c = compositor();
        let base = RgbaImage::from_pixel(400, 400, WHITE);
        let out = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(100));

        let top_left = changed_in(&out, WHITE, 0..200, 0..200);
        let top_right = changed_in(&out, WHITE, 200..400, 0..200);
        let bottom_left = changed_in(&out, WHITE, 0..200, 200..400);
        let bottom_right = changed_in(&out, WHITE, 200..400, 200..400);

        assert!(top_right > 2 * top_left, "tr={top_right} tl={top_left}");
        assert!(bottom_left > 2 * bottom_right, "bl={bottom_left} br={bottom_right}");
    }

    /// Mean position of the stamped pixels in the columns `xs`.
    #[allow(clippy::cast_precision_loss)]
    fn stamped_centroid(out: &RgbaImage, base: Rgba<u8>, xs: std::ops::Range<u32>) -> (f32, f32) {
        let (mut sx, mut sy, mut n) = (0.0_f32, 0.0_f32, 0.0_f32);
        for x in xs {
            for y in 0..out.height() {
                if *out.get_pixel(x, y) != base {
                    sx += x as f32;
                    sy += y as f32;
                    n += 1.0;
                }
            }
        }
        assert!(n > 0.0, "no stamped pixels in band");
        (sx / n, sy / n)
    }

    #[test]
    fn wide_image_text_follows_its_diagonal() {
        let c = compositor();
        let base = RgbaImage::from_pixel(800, 200, WHITE);
        let out = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(100));

        // Font size is capped at h/3, so the text spans roughly x 213..587.
        let (lx, ly) = stamped_centroid(&out, WHITE, 250..270);
        let (rx, ry) = stamped_centroid(&out, WHITE, 530..550);

        let slope = (ry - ly) / (rx - lx);
        assert!((slope + 0.25).abs() < 0.06, "slope {slope}, expected -h/w = -0.25");
        let (mx, my) = ((lx + rx) / 2.0, (ly + ry) / 2.0);
        assert!((mx - 400.0).abs() < 12.0, "midpoint x {mx}");
        assert!((my - 100.0).abs() < 12.0, "midpoint y {my}");
    }

    #[test]
    fn transparent_base_takes_the_fill_color() {
        let c = compositor();
        let base = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 0]));
        let out = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(50));

        let max_red = out
            .pixels()
            .filter(|p| (120..=135).contains(&p[3]))
            .map(|p| p[0])
            .max();
        assert_eq!(max_red, Some(255));
        assert!(out.pixels().filter(|p| p[3] > 0).all(|p| p[0] == 255 && p[1] == 0));
    }

    #[test]
    fn half_transparent_base_mixes_by_alpha() {
        let c = compositor();
        let base = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 255, 128]));

        let opaque = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(100));
        assert!(opaque.pixels().any(|p| *p == Rgba([255, 0, 0, 255])));

        // Full coverage at 50%: out_a = 0.5 + 0.502 * 0.5 = 0.751.
        let half = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(50));
        let p = half.pixels().max_by_key(|p| p[0]).unwrap();
        assert!((169..=171).contains(&p[0]), "{p:?}");
        assert!((84..=86).contains(&p[2]), "{p:?}");
        assert!((191..=192).contains(&p[3]), "{p:?}");
    }

    #[test]
    fn zero_opacity_changes_nothing() {
        let c = compositor();
        let base = RgbaImage::from_pixel(200, 120, WHITE);
        let out = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(0));
        assert_eq!(out, base);
    }

    #[test]
    fn partial_opacity_blends_toward_color() {
        let c = compositor();
        let base = RgbaImage::from_pixel(400, 300, WHITE);
        let out = c.compose(&base, &WatermarkSpec::default().with_opacity_percent(50));
        // Fully covered pixels land halfway between white and red.
        assert!(out.pixels().any(|p| p[0] == 255 && (126..=129).contains(&p[1])));
        assert!(out.pixels().all(|p| p[1] >= 126));
    }

    #[test]
    fn compose_is_deterministic() {
        let c = compositor();
        let mut base = RgbaImage::from_pixel(320, 200, WHITE);
        for (x, y, px) in base.enumerate_pixels_mut() {
            #[allow(clippy::cast_possible_truncation)]
            {
                *px = Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255]);
            }
        }
        let spec = WatermarkSpec::default().with_text("SOLO PARA TRÁMITE");
        assert_eq!(c.compose(&base, &spec), c.compose(&base, &spec));
    }

    #[test]
    fn spec_builders() {
        let spec = WatermarkSpec::default()
            .with_text("")
            .with_opacity_percent(250)
            .with_color(Rgba([0, 0, 255, 255]));
        assert_eq!(spec.text, DEFAULT_WATERMARK_TEXT);
        assert!((spec.opacity - 1.0).abs() < f32::EPSILON);
        assert_eq!(spec.color, Rgba([0, 0, 255, 255]));

        let spec = WatermarkSpec::default().with_opacity_percent(35);
        assert!((spec.opacity - 0.35).abs() < 1e-6);
    }

    #[test]
    fn invalid_font_data_is_rejected() {
        let err = WatermarkCompositor::from_font_data(vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidFont));
    }
}
