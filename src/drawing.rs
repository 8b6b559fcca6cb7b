//! Destructive brush strokes driven by pointer input.
//!
//! Pointer samples arrive in display units (the on-screen element the image is
//! shown in) and are mapped to buffer pixels before painting. Strokes are
//! baked straight into the working buffer; nothing about them is retained.

use std::str::FromStr;

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Minimum brush width in buffer pixels.
pub const MIN_BRUSH_WIDTH: f32 = 10.0;

/// Brush width is `buffer_width / BRUSH_WIDTH_DIVISOR` above the minimum.
const BRUSH_WIDTH_DIVISOR: f32 = 50.0;

/// A position in buffer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Kind of pointer sample. Mouse and touch input map onto the same kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Button pressed or finger placed.
    Down,
    /// Pointer moved.
    Move,
    /// Button released or finger lifted.
    Up,
    /// Pointer left the drawing surface.
    Leave,
}

/// One sampled pointer event in client (display) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// What happened.
    pub kind: PointerKind,
    /// Client x coordinate.
    pub x: f32,
    /// Client y coordinate.
    pub y: f32,
}

impl PointerEvent {
    /// Pointer pressed at `(x, y)`.
    #[must_use]
    pub const fn down(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Down,
            x,
            y,
        }
    }

    /// Pointer moved to `(x, y)`.
    #[must_use]
    pub const fn moved(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Move,
            x,
            y,
        }
    }

    /// Pointer released at `(x, y)`.
    #[must_use]
    pub const fn up(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Up,
            x,
            y,
        }
    }

    /// Pointer left the surface at `(x, y)`.
    #[must_use]
    pub const fn leave(x: f32, y: f32) -> Self {
        Self {
            kind: PointerKind::Leave,
            x,
            y,
        }
    }
}

/// On-screen bounds of the element displaying the working buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Client x of the element's left edge.
    pub left: f32,
    /// Client y of the element's top edge.
    pub top: f32,
    /// Displayed width.
    pub width: f32,
    /// Displayed height.
    pub height: f32,
}

impl Viewport {
    /// A viewport showing a `width` x `height` buffer at 1:1 scale at the origin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn unscaled(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }

    /// Map client coordinates to buffer pixels for a buffer of the given size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_buffer(&self, x: f32, y: f32, buffer_width: u32, buffer_height: u32) -> Point {
        let scale_x = if self.width > 0.0 {
            buffer_width as f32 / self.width
        } else {
            1.0
        };
        let scale_y = if self.height > 0.0 {
            buffer_height as f32 / self.height
        } else {
            1.0
        };
        Point::new((x - self.left) * scale_x, (y - self.top) * scale_y)
    }
}

/// Brush width in pixels for a buffer `buffer_width` pixels wide.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn brush_width(buffer_width: u32) -> f32 {
    (buffer_width as f32 / BRUSH_WIDTH_DIVISOR).max(MIN_BRUSH_WIDTH)
}

/// A polyline traced with the pointer held down, in client coordinates.
///
/// Parses from whitespace-separated `x,y` pairs, e.g. `"10,10 200,10 200,40"`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokePath {
    points: Vec<Point>,
}

impl StrokePath {
    /// A path through `points`. Returns `None` for an empty list.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    /// The points of the path.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Pointer events tracing this path: down at the first point, a move to
    /// each following point, then up at the last.
    pub fn events(&self) -> impl Iterator<Item = PointerEvent> + '_ {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        std::iter::once(PointerEvent::down(first.x, first.y))
            .chain(
                self.points[1..]
                    .iter()
                    .map(|p| PointerEvent::moved(p.x, p.y)),
            )
            .chain(std::iter::once(PointerEvent::up(last.x, last.y)))
    }
}

impl FromStr for StrokePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let points = s
            .split_whitespace()
            .map(|pair| {
                let (x, y) = pair
                    .split_once(',')
                    .ok_or_else(|| Error::InvalidStroke(format!("expected x,y, got {pair:?}")))?;
                let coord = |v: &str| {
                    v.trim()
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| Error::InvalidStroke(format!("bad coordinate {v:?}")))
                };
                Ok(Point::new(coord(x)?, coord(y)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(points).ok_or_else(|| Error::InvalidStroke("no points".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PenState {
    Idle,
    Drawing { last: Point },
}

/// Pointer state machine that paints round-capped strokes.
///
/// `Idle --down--> Drawing --move--> Drawing --up/leave--> Idle`. Moves while
/// idle are ignored. A down event paints a dot so taps still mark a point.
#[derive(Debug, Clone)]
pub struct DrawingEngine {
    state: PenState,
}

impl Default for DrawingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingEngine {
    /// A new engine in the idle state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: PenState::Idle,
        }
    }

    /// Whether a stroke is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, PenState::Drawing { .. })
    }

    /// Feed one pointer event, painting onto `canvas` with `color`.
    pub fn handle(
        &mut self,
        canvas: &mut RgbaImage,
        color: Rgba<u8>,
        viewport: &Viewport,
        event: PointerEvent,
    ) {
        let width = brush_width(canvas.width());
        match (event.kind, self.state) {
            (PointerKind::Down, _) => {
                let pos = viewport.to_buffer(event.x, event.y, canvas.width(), canvas.height());
                paint_segment(canvas, pos, pos, width, color);
                self.state = PenState::Drawing { last: pos };
            }
            (PointerKind::Move, PenState::Drawing { last }) => {
                let pos = viewport.to_buffer(event.x, event.y, canvas.width(), canvas.height());
                paint_segment(canvas, last, pos, width, color);
                self.state = PenState::Drawing { last: pos };
            }
            (PointerKind::Move, PenState::Idle) => {}
            (PointerKind::Up | PointerKind::Leave, _) => self.state = PenState::Idle,
        }
    }

    /// Feed a sequence of pointer events in order.
    pub fn apply<I>(&mut self, canvas: &mut RgbaImage, color: Rgba<u8>, viewport: &Viewport, events: I)
    where
        I: IntoIterator<Item = PointerEvent>,
    {
        for event in events {
            self.handle(canvas, color, viewport, event);
        }
    }
}

/// Paint a straight segment of the given width with round caps.
///
/// A pixel is covered when its center lies within `width / 2` of the segment.
/// Parts of the segment outside the canvas are clipped.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn paint_segment(canvas: &mut RgbaImage, from: Point, to: Point, width: f32, color: Rgba<u8>) {
    let radius = width / 2.0;
    let (cw, ch) = (canvas.width() as f32, canvas.height() as f32);

    let x0 = (from.x.min(to.x) - radius).floor().max(0.0);
    let y0 = (from.y.min(to.y) - radius).floor().max(0.0);
    let x1 = (from.x.max(to.x) + radius).ceil().min(cw);
    let y1 = (from.y.max(to.y) + radius).ceil().min(ch);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len_sq = dx * dx + dy * dy;
    let r_sq = radius * radius;

    for y in (y0 as u32)..(y1 as u32) {
        for x in (x0 as u32)..(x1 as u32) {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let t = if len_sq > 0.0 {
                (((px - from.x) * dx + (py - from.y) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let (nx, ny) = (from.x + t * dx - px, from.y + t * dy - py);
            if nx * nx + ny * ny <= r_sq {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}
