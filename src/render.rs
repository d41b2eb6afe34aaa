#![forbid(unsafe_code)]

//! Dirty-aware cell renderer.
//!
//! Paints a [`GridSnapshot`] onto a [`Surface`] one line band at a time,
//! repainting only what changed:
//!
//! - lines the buffer reports dirty,
//! - the cursor's current and previous lines when the cursor moved or blink
//!   is active (the cursor is a renderer-owned visual the buffer's dirty
//!   bits never track),
//! - everything, when the caller forces it or the surface's physical size
//!   stopped matching `cols × rows × metrics × dpr`.
//!
//! Redraw cost therefore scales with the number of changed lines, not grid
//! size. Per-cell painting layers background, glyph, and decorations with
//! inverse/faint/invisible handling; wide glyphs span two columns and their
//! width-0 continuation cells are never painted independently.

use std::rc::Rc;

use serde::Deserialize;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::cell::{Cell, StyleFlags};
use crate::grid::GridSnapshot;
use crate::surface::{FontMetrics, Surface, font_css};
use crate::theme::{Palette, Theme, ThemePatch};

/// Cursor blink half-period, matching established terminal convention.
pub const BLINK_INTERVAL_MS: u32 = 530;

/// Default font size in logical pixels.
pub const DEFAULT_FONT_SIZE: f64 = 15.0;

/// Default font family.
pub const DEFAULT_FONT_FAMILY: &str = "monospace";

/// Cursor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStyle {
    /// Fill the entire cell.
    #[default]
    Block,
    /// Band at the bottom of the cell.
    Underline,
    /// Column at the left edge of the cell.
    Bar,
}

/// Renderer construction configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub font_size: f64,
    pub font_family: String,
    pub cursor_style: CursorStyle,
    pub cursor_blink: bool,
    pub theme: Theme,
    /// Device pixel ratio: physical pixels per logical pixel.
    pub dpr: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            cursor_style: CursorStyle::default(),
            cursor_blink: true,
            theme: Theme::default(),
            dpr: 1.0,
        }
    }
}

impl RenderConfig {
    /// Fold host options over this configuration.
    pub fn apply(&mut self, options: &TermOptions) {
        if let Some(size) = options.font_size {
            self.font_size = size;
        }
        if let Some(family) = &options.font_family {
            self.font_family = family.clone();
        }
        if let Some(style) = options.cursor_style {
            self.cursor_style = style;
        }
        if let Some(blink) = options.cursor_blink {
            self.cursor_blink = blink;
        }
        if let Some(theme) = &options.theme {
            self.theme = Theme::from_patch(theme);
        }
        if let Some(dpr) = options.device_pixel_ratio {
            self.dpr = dpr;
        }
    }
}

/// Host-supplied options: any subset of the configuration surface,
/// camelCase JSON, merged over defaults. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TermOptions {
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub cursor_style: Option<CursorStyle>,
    pub cursor_blink: Option<bool>,
    pub theme: Option<ThemePatch>,
    pub device_pixel_ratio: Option<f64>,
}

/// Counters for the most recent render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Lines whose band was repainted this pass.
    pub lines_repainted: u32,
    /// Non-continuation cells processed within repainted lines.
    pub cells_painted: u32,
    /// Whether every line was repainted (caller-forced or size mismatch).
    pub forced_full: bool,
    /// Whether the cursor glyph was painted.
    pub cursor_painted: bool,
}

/// Shared cursor blink visibility flag.
///
/// The renderer reads it at every cursor-paint decision; the host's
/// recurring timer toggles it between frames. `Rc` because everything here
/// lives on one cooperative loop — callbacks and renders never interleave.
#[derive(Debug, Clone)]
pub struct BlinkFlag(Rc<std::cell::Cell<bool>>);

impl BlinkFlag {
    fn new() -> Self {
        Self(Rc::new(std::cell::Cell::new(true)))
    }

    /// Flip visibility; called from the recurring timer.
    pub fn toggle(&self) {
        self.0.set(!self.0.get());
    }

    pub fn set(&self, visible: bool) {
        self.0.set(visible);
    }

    #[must_use]
    pub fn get(&self) -> bool {
        self.0.get()
    }
}

/// The dirty-aware cell renderer. Owns its drawing surface exclusively.
#[derive(Debug)]
pub struct Renderer<S: Surface> {
    surface: S,
    font_size: f64,
    font_family: String,
    cursor_style: CursorStyle,
    blink_enabled: bool,
    theme: Theme,
    palette: Palette,
    dpr: f64,
    metrics: FontMetrics,
    /// Cursor cell painted by the previous frame, for invalidation.
    last_cursor: Option<(u16, u16)>,
    blink_visible: BlinkFlag,
    disposed: bool,
    stats: FrameStats,
}

impl<S: Surface> Renderer<S> {
    /// Build a renderer owning `surface`; font metrics are measured
    /// immediately.
    ///
    /// When `config.cursor_blink` is set the host must start the recurring
    /// visibility timer right away: toggle [`Renderer::blink_flag`] every
    /// [`BLINK_INTERVAL_MS`] and release the timer on dispose.
    #[must_use]
    pub fn new(mut surface: S, config: RenderConfig) -> Self {
        let metrics = FontMetrics::measure(&mut surface, config.font_size, &config.font_family);
        let palette = config.theme.palette();
        Self {
            surface,
            font_size: config.font_size,
            font_family: config.font_family,
            cursor_style: config.cursor_style,
            blink_enabled: config.cursor_blink,
            theme: config.theme,
            palette,
            dpr: config.dpr,
            metrics,
            last_cursor: None,
            blink_visible: BlinkFlag::new(),
            disposed: false,
            stats: FrameStats::default(),
        }
    }

    /// Size the surface for a `cols × rows` grid and repaint the full
    /// background. Idempotent for the same (cols, rows, metrics, dpr)
    /// tuple; callers invoke it only when dimensions actually changed
    /// (`render` does this itself on mismatch).
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let logical_width = f64::from(cols) * self.metrics.width;
        let logical_height = f64::from(rows) * self.metrics.height;
        self.surface.resize(logical_width, logical_height, self.dpr);
        self.surface.set_fill(self.theme.background);
        self.surface.fill_rect(0.0, 0.0, logical_width, logical_height);
        #[cfg(feature = "tracing")]
        trace!(cols, rows, dpr = self.dpr, "surface resized");
    }

    /// Paint one frame.
    ///
    /// Repaints dirty lines plus cursor-invalidated lines, or everything
    /// when forced; paints the cursor when both the buffer and the blink
    /// flag say it is visible; clears the buffer's dirty bits only on
    /// non-forced passes.
    pub fn render<G: GridSnapshot>(&mut self, buffer: &mut G, force_all: bool) -> FrameStats {
        let (cols, rows) = buffer.dims();
        let cursor = buffer.cursor();

        // A physical-size mismatch (grid resize, font change, DPI change)
        // overrides dirty tracking for this frame.
        let mut force_all = force_all;
        if self.surface.device_size() != self.device_size_for(cols, rows) {
            self.resize(cols, rows);
            force_all = true;
        }

        let mut stats = FrameStats {
            forced_full: force_all,
            ..FrameStats::default()
        };

        // The buffer's dirty bits do not track the cursor. Invalidate its
        // current and previous lines whenever it moved, and always while
        // blinking: the flag may have flipped since the last frame.
        let moved = self.last_cursor != Some((cursor.col, cursor.row));
        let mut cursor_lines: [Option<u16>; 2] = [None, None];
        if moved || self.blink_enabled {
            cursor_lines[0] = Some(cursor.row);
            if let Some((_, prev_row)) = self.last_cursor
                && prev_row != cursor.row
            {
                cursor_lines[1] = Some(prev_row);
            }
        }

        for row in 0..rows {
            let wants = force_all || buffer.is_dirty(row) || cursor_lines.contains(&Some(row));
            if !wants {
                continue;
            }
            stats.lines_repainted += 1;
            stats.cells_painted += self.paint_line(buffer.line(row), row, cols);
        }

        // Visible only when both the buffer and the blink phase agree.
        if cursor.visible && self.blink_visible.get() && cursor.col < cols && cursor.row < rows {
            self.paint_cursor(buffer.line(cursor.row), cursor.col, cursor.row);
            stats.cursor_painted = true;
        }

        self.last_cursor = Some((cursor.col, cursor.row));
        if !force_all {
            // A forced pass leaves the dirty bits untouched: whoever forced
            // it decided to treat everything as dirty, not this frame.
            buffer.clear_dirty();
        }
        self.stats = stats;
        stats
    }

    /// Clear one line band to the theme background, then paint its cells.
    /// Returns the number of non-continuation cells processed.
    fn paint_line(&mut self, cells: &[Cell], row: u16, cols: u16) -> u32 {
        let y = f64::from(row) * self.metrics.height;
        self.surface.set_fill(self.theme.background);
        self.surface
            .fill_rect(0.0, y, f64::from(cols) * self.metrics.width, self.metrics.height);

        let mut painted = 0;
        for (col, cell) in cells.iter().enumerate() {
            if cell.is_continuation() {
                // Shadow of the preceding wide glyph; its pixels were
                // painted by the leading cell.
                continue;
            }
            self.paint_cell(cell, col as u16, row);
            painted += 1;
        }
        painted
    }

    fn paint_cell(&mut self, cell: &Cell, col: u16, row: u16) {
        let m = self.metrics;
        let x = f64::from(col) * m.width;
        let y = f64::from(row) * m.height;
        let span = m.width * f64::from(cell.width().max(1));

        let mut fg = cell.fg.resolve(self.theme.foreground, &self.palette);
        let mut bg = cell.bg.resolve(self.theme.background, &self.palette);
        let inverse = cell.flags.contains(StyleFlags::INVERSE);
        if inverse {
            // Swap effective paint roles; the stored cell is untouched.
            std::mem::swap(&mut fg, &mut bg);
        }

        // The line clear already painted the default background, so only a
        // non-default (or swapped-in) background needs its own fill.
        if !cell.bg.is_default() || inverse {
            self.surface.set_fill(bg);
            self.surface.fill_rect(x, y, span, m.height);
        }

        if cell.flags.contains(StyleFlags::INVISIBLE) {
            return;
        }

        let faint = cell.flags.contains(StyleFlags::FAINT);
        self.surface
            .set_font(&font_css(self.font_size, &self.font_family, cell.flags));
        self.surface.set_fill(fg);
        if faint {
            self.surface.set_alpha(0.5);
        }

        let mut buf = [0u8; 4];
        self.surface
            .fill_text(cell.content().encode_utf8(&mut buf), x, y + m.baseline);

        // Decorations are independent of each other and span the full glyph
        // width, wide cells included.
        if cell.flags.contains(StyleFlags::UNDERLINE) {
            self.surface.fill_rect(x, y + m.baseline + 2.0, span, 1.0);
        }
        if cell.flags.contains(StyleFlags::STRIKETHROUGH) {
            self.surface.fill_rect(x, y + m.height / 2.0, span, 1.0);
        }
        if faint {
            self.surface.set_alpha(1.0);
        }
    }

    /// Paint the cursor over its cell in the theme cursor color.
    fn paint_cursor(&mut self, line: &[Cell], col: u16, row: u16) {
        let m = self.metrics;
        let cell_span = line.get(col as usize).map_or(1, |c| c.width().max(1));
        let width = m.width * f64::from(cell_span);
        let x = f64::from(col) * m.width;
        let y = f64::from(row) * m.height;

        self.surface.set_fill(self.theme.cursor);
        match self.cursor_style {
            CursorStyle::Block => {
                self.surface.fill_rect(x, y, width, m.height);
            }
            CursorStyle::Underline => {
                let band = (m.height * 0.15).max(2.0);
                self.surface.fill_rect(x, y + m.height - band, width, band);
            }
            CursorStyle::Bar => {
                let bar = (m.width * 0.15).max(2.0);
                self.surface.fill_rect(x, y, bar, m.height);
            }
        }
    }

    fn device_size_for(&self, cols: u16, rows: u16) -> (u32, u32) {
        (
            (f64::from(cols) * self.metrics.width * self.dpr).round() as u32,
            (f64::from(rows) * self.metrics.height * self.dpr).round() as u32,
        )
    }

    /// Replace the theme (a patch merged over the complete default) and
    /// rebuild the palette.
    pub fn set_theme(&mut self, patch: &ThemePatch) {
        self.theme = Theme::from_patch(patch);
        self.palette = self.theme.palette();
    }

    /// Change the font size and re-measure metrics synchronously. The
    /// caller triggers a resize or forced render afterward; this component
    /// never self-triggers a repaint.
    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = size;
        self.remeasure();
    }

    /// Change the font family and re-measure metrics synchronously.
    pub fn set_font_family(&mut self, family: &str) {
        self.font_family = family.to_string();
        self.remeasure();
    }

    /// Re-measure metrics for the current font. Hosts call this when an
    /// externally loaded font face replaces the fallback the first
    /// measurement saw.
    pub fn refresh_metrics(&mut self) {
        self.remeasure();
    }

    fn remeasure(&mut self) {
        self.metrics = FontMetrics::measure(&mut self.surface, self.font_size, &self.font_family);
    }

    pub fn set_cursor_style(&mut self, style: CursorStyle) {
        self.cursor_style = style;
    }

    /// Enable or disable blinking. Disabling forces the visibility flag
    /// back to true so the cursor can never get stuck invisible; the host
    /// stops or starts its timer to match.
    pub fn set_cursor_blink(&mut self, enabled: bool) {
        self.blink_enabled = enabled;
        if !enabled {
            self.blink_visible.set(true);
        }
    }

    /// Change the device pixel ratio (browser zoom, monitor move). The next
    /// render sees a size mismatch and repaints fully.
    pub fn set_dpr(&mut self, dpr: f64) {
        self.dpr = dpr;
    }

    /// Fold a runtime options patch over the live configuration through the
    /// individual mutators, so re-measurement and palette rebuilds happen
    /// exactly where needed.
    pub fn apply_options(&mut self, options: &TermOptions) {
        if let Some(theme) = &options.theme {
            self.set_theme(theme);
        }
        if let Some(style) = options.cursor_style {
            self.set_cursor_style(style);
        }
        if let Some(blink) = options.cursor_blink {
            self.set_cursor_blink(blink);
        }
        if let Some(dpr) = options.device_pixel_ratio {
            self.set_dpr(dpr);
        }
        if let Some(family) = &options.font_family {
            self.set_font_family(family);
        }
        if let Some(size) = options.font_size {
            self.set_font_size(size);
        }
    }

    /// Mark the renderer disposed. Idempotent; the host releases its blink
    /// timer alongside.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub const fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    #[must_use]
    pub const fn theme(&self) -> &Theme {
        &self.theme
    }

    #[must_use]
    pub const fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    #[must_use]
    pub const fn blink_enabled(&self) -> bool {
        self.blink_enabled
    }

    /// Shared blink visibility flag for the host's timer closure.
    #[must_use]
    pub fn blink_flag(&self) -> BlinkFlag {
        self.blink_visible.clone()
    }

    #[must_use]
    pub const fn dpr(&self) -> f64 {
        self.dpr
    }

    #[must_use]
    pub const fn last_stats(&self) -> FrameStats {
        self.stats
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    pub const fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
