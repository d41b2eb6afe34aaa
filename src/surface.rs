#![forbid(unsafe_code)]

//! Drawing-surface contract and font measurement.
//!
//! [`Surface`] is the minimal 2D-canvas-shaped vocabulary the renderer
//! paints with: an opaque backing store sized in device pixels, a scalar
//! fill state (color, alpha, font), and fill-rect/fill-text/measure-text.
//! The wasm target implements it on `CanvasRenderingContext2d`;
//! [`RecordingSurface`] implements it as an op log for headless tests and
//! benches.
//!
//! All paint coordinates are logical (CSS) pixels. The device-pixel-ratio
//! scale is applied once inside [`Surface::resize`], so callers never
//! multiply coordinates themselves.

use std::fmt;

use crate::cell::StyleFlags;
use crate::color::Rgb;

/// Reference glyph for cell-width measurement.
const REFERENCE_GLYPH: &str = "M";
/// Cell height as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.2;
/// Descent reserve below the baseline, as a fraction of the font size.
const DESCENT_RATIO: f64 = 0.2;

/// Errors raised while acquiring or driving a drawing surface.
///
/// Acquisition failure is fatal at construction: no renderer value exists
/// until a usable context does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    /// The host returned no usable opaque 2D drawing context.
    ContextUnavailable,
    /// The drawing surface rejected an operation.
    Surface(String),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContextUnavailable => write!(f, "no opaque 2d drawing context available"),
            Self::Surface(msg) => write!(f, "drawing surface error: {msg}"),
        }
    }
}

impl std::error::Error for RendererError {}

/// The paint vocabulary the renderer needs from a pixel surface.
///
/// State setters (`set_fill`, `set_alpha`, `set_font`) apply to subsequent
/// fill operations, mirroring 2D canvas semantics. [`Surface::resize`]
/// resets transient paint state (alpha back to 1.0), exactly as assigning
/// a canvas backing-store size does.
pub trait Surface {
    /// Physical backing-store size in device pixels.
    fn device_size(&self) -> (u32, u32);

    /// Size the backing store for a logical area at the given device pixel
    /// ratio, and scale the coordinate system so paint coordinates stay
    /// logical.
    fn resize(&mut self, logical_width: f64, logical_height: f64, dpr: f64);

    /// Set the font for subsequent text fills (CSS font shorthand).
    fn set_font(&mut self, font: &str);

    /// Set the fill color for subsequent fills.
    fn set_fill(&mut self, color: Rgb);

    /// Set the global alpha for subsequent fills (0.0–1.0).
    fn set_alpha(&mut self, alpha: f64);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);

    /// Paint `text` with its alphabetic baseline at `y`.
    fn fill_text(&mut self, text: &str, x: f64, y: f64);

    /// Advance width of `text` at the current font, in logical pixels.
    fn measure_text(&mut self, text: &str) -> f64;
}

/// Compose the CSS font shorthand for a size/family and style flags.
///
/// Only italic and bold participate; every other style is painted as
/// geometry, not as a font variation.
#[must_use]
pub fn font_css(size: f64, family: &str, flags: StyleFlags) -> String {
    let mut css = String::new();
    if flags.contains(StyleFlags::ITALIC) {
        css.push_str("italic ");
    }
    if flags.contains(StyleFlags::BOLD) {
        css.push_str("bold ");
    }
    css.push_str(&format!("{size}px {family}"));
    css
}

/// Cell geometry derived from one font configuration.
///
/// Units are logical pixels. Derived once per font change via
/// [`FontMetrics::measure`]; never adjusted frame-to-frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    /// Advance width of one narrow cell.
    pub width: f64,
    /// Height of one cell row.
    pub height: f64,
    /// Distance from the cell top to the text baseline.
    pub baseline: f64,
}

impl FontMetrics {
    /// Measure cell geometry for a font on the given surface.
    ///
    /// Width comes from the surface's advance for a reference glyph; height
    /// and baseline are derived from the font size with a fixed line-height
    /// and descent reserve, which keeps the underline position
    /// (baseline + 2) inside the cell for all practical sizes.
    pub fn measure(surface: &mut impl Surface, size: f64, family: &str) -> Self {
        surface.set_font(&font_css(size, family, StyleFlags::empty()));
        let width = surface.measure_text(REFERENCE_GLYPH).ceil().max(1.0);
        let height = (size * LINE_HEIGHT).ceil().max(2.0);
        let descent = (size * DESCENT_RATIO).ceil();
        let baseline = (height - descent).max(1.0);
        Self {
            width,
            height,
            baseline,
        }
    }
}

/// One captured paint command (see [`RecordingSurface`]).
///
/// Fill state is resolved into each op, so assertions read the effective
/// color/font/alpha directly instead of replaying setter history.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Resize {
        device_width: u32,
        device_height: u32,
        dpr: f64,
    },
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgb,
        alpha: f64,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        color: Rgb,
        font: String,
        alpha: f64,
    },
}

/// A [`Surface`] that records every paint command instead of rasterizing.
///
/// Glyph advance is a fixed per-character width (monospace fake), so font
/// metrics and wide-cell geometry stay deterministic in headless runs. Used
/// by the renderer tests, the integration property suite, and the criterion
/// bench.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    device: (u32, u32),
    glyph_width: f64,
    fill: Rgb,
    alpha: f64,
    font: String,
    ops: Vec<PaintOp>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::with_glyph_width(8.0)
    }

    /// A recording surface whose every glyph advances `glyph_width` pixels.
    #[must_use]
    pub fn with_glyph_width(glyph_width: f64) -> Self {
        Self {
            device: (0, 0),
            glyph_width,
            fill: Rgb::default(),
            alpha: 1.0,
            font: String::new(),
            ops: Vec::new(),
        }
    }

    /// All captured ops since construction or the last [`Self::take_ops`].
    #[must_use]
    pub fn ops(&self) -> &[PaintOp] {
        &self.ops
    }

    /// Drain the op log, leaving it empty for the next frame.
    pub fn take_ops(&mut self) -> Vec<PaintOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for RecordingSurface {
    fn device_size(&self) -> (u32, u32) {
        self.device
    }

    fn resize(&mut self, logical_width: f64, logical_height: f64, dpr: f64) {
        self.device = (
            (logical_width * dpr).round() as u32,
            (logical_height * dpr).round() as u32,
        );
        // Canvas semantics: sizing the backing store resets paint state.
        self.alpha = 1.0;
        self.ops.push(PaintOp::Resize {
            device_width: self.device.0,
            device_height: self.device.1,
            dpr,
        });
    }

    fn set_font(&mut self, font: &str) {
        self.font = font.to_string();
    }

    fn set_fill(&mut self, color: Rgb) {
        self.fill = color;
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.ops.push(PaintOp::FillRect {
            x,
            y,
            width,
            height,
            color: self.fill,
            alpha: self.alpha,
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.ops.push(PaintOp::FillText {
            text: text.to_string(),
            x,
            y,
            color: self.fill,
            font: self.font.clone(),
            alpha: self.alpha,
        });
    }

    fn measure_text(&mut self, text: &str) -> f64 {
        self.glyph_width * text.chars().count() as f64
    }
}
