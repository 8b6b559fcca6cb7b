//! Per-image editing sessions and batch export.

use image::RgbaImage;

use crate::color::BrushColor;
use crate::compositor::{WatermarkCompositor, WatermarkSpec};
use crate::drawing::{DrawingEngine, PointerEvent, Viewport};
use crate::encoder::{suggest_file_name, RasterEncoder};
use crate::error::Result;
use crate::raster::RasterImage;

/// Identifies a session within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One loaded image: its untouched original, the buffer being censored, and
/// the brush used on it.
///
/// The working buffer always has the original's dimensions.
#[derive(Debug, Clone)]
pub struct EditorSession {
    id: SessionId,
    original: RasterImage,
    working: RgbaImage,
    brush_color: BrushColor,
    file_name: String,
    pen: DrawingEngine,
}

impl EditorSession {
    fn new(id: SessionId, original: RasterImage, file_name: String) -> Self {
        let working = original.pixels().clone();
        Self {
            id,
            original,
            working,
            brush_color: BrushColor::default(),
            file_name,
            pen: DrawingEngine::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Name of the file the image was loaded from.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The image as loaded.
    #[must_use]
    pub fn original(&self) -> &RasterImage {
        &self.original
    }

    /// The image with every stroke painted so far.
    #[must_use]
    pub fn working(&self) -> &RgbaImage {
        &self.working
    }

    /// Color used by subsequent strokes.
    #[must_use]
    pub fn brush_color(&self) -> BrushColor {
        self.brush_color
    }

    /// Change the brush. Strokes already painted keep their color.
    pub fn set_brush_color(&mut self, color: BrushColor) {
        self.brush_color = color;
    }

    /// Whether a stroke is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.pen.is_drawing()
    }

    /// Feed one pointer event from an element with the given on-screen bounds.
    pub fn pointer(&mut self, viewport: &Viewport, event: PointerEvent) {
        self.pen
            .handle(&mut self.working, self.brush_color.rgba(), viewport, event);
    }

    /// Feed a sequence of pointer events in order.
    pub fn apply_stroke<I>(&mut self, viewport: &Viewport, events: I)
    where
        I: IntoIterator<Item = PointerEvent>,
    {
        self.pen
            .apply(&mut self.working, self.brush_color.rgba(), viewport, events);
    }

    /// Discard every stroke by copying the original pixels back.
    pub fn revert(&mut self) {
        self.working.copy_from_slice(self.original.pixels().as_raw());
    }

    /// Whether the working buffer still matches the original exactly.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.working.as_raw() == self.original.pixels().as_raw()
    }

    /// Composite the watermark over the current working buffer.
    #[must_use]
    pub fn compose(&self, compositor: &WatermarkCompositor, spec: &WatermarkSpec) -> RgbaImage {
        compositor.compose(&self.working, spec)
    }

    fn export<E>(&self, compositor: &WatermarkCompositor, spec: &WatermarkSpec, encoder: &E) -> ExportResult
    where
        E: RasterEncoder + ?Sized,
    {
        let outcome = encoder
            .encode(&self.compose(compositor, spec))
            .map(|encoded_bytes| CompositedResult {
                encoded_bytes,
                suggested_file_name: suggest_file_name(&self.file_name),
            });

        match &outcome {
            Ok(result) => tracing::info!(
                session = %self.id,
                file = %self.file_name,
                bytes = result.encoded_bytes.len(),
                "exported"
            ),
            Err(e) => tracing::warn!(
                session = %self.id,
                file = %self.file_name,
                error = %e,
                "export failed"
            ),
        }

        ExportResult {
            session: self.id,
            file_name: self.file_name.clone(),
            outcome,
        }
    }
}

/// An encoded, watermarked image ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositedResult {
    /// The encoded image.
    pub encoded_bytes: Vec<u8>,
    /// File name to offer the user.
    pub suggested_file_name: String,
}

/// Export outcome for one session.
#[derive(Debug)]
pub struct ExportResult {
    /// Session the result belongs to.
    pub session: SessionId,
    /// Original file name, for reporting.
    pub file_name: String,
    /// The encoded image, or why this image failed.
    pub outcome: Result<CompositedResult>,
}

impl ExportResult {
    /// Whether this image exported successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The sessions of one batch, kept in load order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<EditorSession>,
    next_id: u64,
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for a decoded image.
    pub fn add(&mut self, image: RasterImage, file_name: impl Into<String>) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions
            .push(EditorSession::new(id, image, file_name.into()));
        id
    }

    /// Decode `(name, bytes)` entries and start a session for each image.
    ///
    /// Entries that do not decode as an image are skipped without error.
    /// Returns the ids of the new sessions, in input order.
    pub fn ingest<I, N, B>(&mut self, entries: I) -> Vec<SessionId>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: AsRef<[u8]>,
    {
        let mut ids = Vec::new();
        for (name, bytes) in entries {
            let name: String = name.into();
            match RasterImage::decode(bytes.as_ref()) {
                Ok(image) => ids.push(self.add(image, name)),
                Err(e) => tracing::debug!(file = %name, error = %e, "skipping non-image input"),
            }
        }
        ids
    }

    /// Every session, in the order they were added.
    #[must_use]
    pub fn all(&self) -> &[EditorSession] {
        &self.sessions
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&EditorSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Look up a session for editing.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut EditorSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Discard every session and its buffers.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Watermark and encode every session.
    ///
    /// Results come back in session order. A failing image is reported in its
    /// own [`ExportResult`] and does not affect the others. Uses parallel
    /// iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn export<E>(
        &self,
        compositor: &WatermarkCompositor,
        spec: &WatermarkSpec,
        encoder: &E,
    ) -> Vec<ExportResult>
    where
        E: RasterEncoder + ?Sized,
    {
        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            self.sessions
                .par_iter()
                .map(|session| session.export(compositor, spec, encoder))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            self.sessions
                .iter()
                .map(|session| session.export(compositor, spec, encoder))
                .collect()
        }
    }
}
