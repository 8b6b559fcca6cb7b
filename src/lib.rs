//! Censor regions of document scans and stamp a diagonal watermark across them.
//!
//! Each loaded image becomes an [`EditorSession`] holding the untouched
//! original and a working copy. Pointer input paints opaque strokes straight
//! into the working copy; [`EditorSession::revert`] restores the original.
//! On export, a [`WatermarkCompositor`] stamps rotated text sized to span the
//! image diagonal, and an [`ExportEncoder`] turns the result into bytes.
//!
//! # Quick Start
//!
//! ```no_run
//! use docstamp::{
//!     ExportEncoder, PointerEvent, SessionRegistry, Viewport, WatermarkCompositor, WatermarkSpec,
//! };
//!
//! let mut registry = SessionRegistry::new();
//! let bytes = std::fs::read("dni.jpg").unwrap();
//! let ids = registry.ingest([("dni.jpg", bytes)]);
//!
//! let session = registry.get_mut(ids[0]).unwrap();
//! let (w, h) = session.working().dimensions();
//! session.apply_stroke(
//!     &Viewport::unscaled(w, h),
//!     [PointerEvent::down(40.0, 60.0), PointerEvent::moved(300.0, 60.0), PointerEvent::up(300.0, 60.0)],
//! );
//!
//! let compositor = WatermarkCompositor::new().expect("embedded font");
//! let spec = WatermarkSpec::default().with_opacity_percent(40);
//! for result in registry.export(&compositor, &spec, &ExportEncoder::default()) {
//!     let out = result.outcome.unwrap();
//!     std::fs::write(&out.suggested_file_name, &out.encoded_bytes).unwrap();
//! }
//! ```

#![deny(missing_docs)]

pub mod color;
pub mod compositor;
pub mod drawing;
pub mod encoder;
pub mod error;
mod fonts;
pub mod raster;
mod session;

pub use color::{parse_hex_color, BrushColor, DEFAULT_WATERMARK_COLOR};
pub use compositor::{FontFit, WatermarkCompositor, WatermarkSpec, DEFAULT_WATERMARK_TEXT};
pub use drawing::{brush_width, DrawingEngine, Point, PointerEvent, PointerKind, StrokePath, Viewport};
pub use encoder::{suggest_file_name, ExportEncoder, ExportFormat, RasterEncoder};
pub use error::{Error, Result};
pub use raster::RasterImage;
pub use session::{CompositedResult, EditorSession, ExportResult, SessionId, SessionRegistry};
