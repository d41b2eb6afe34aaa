#![forbid(unsafe_code)]

//! The renderer's read contract onto the terminal-state engine, plus a
//! minimal owned grid for embedders that keep a local buffer.
//!
//! The external engine owns the authoritative grid, cursor, and dirty
//! bookkeeping; [`GridSnapshot`] is the per-frame window the renderer reads
//! through. [`VecGrid`] is a straightforward row-major implementation of
//! that contract — enough for local echo, tests, and benches, with no
//! scrollback and no VT semantics.

use unicode_width::UnicodeWidthChar;

use crate::cell::{Cell, StyleFlags};
use crate::color::Color;

/// Cursor position and buffer-level visibility for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorView {
    pub col: u16,
    pub row: u16,
    /// Buffer-level visibility (DECTCEM); blink is layered on top by the
    /// renderer and is not part of the snapshot.
    pub visible: bool,
}

/// Per-frame read access to the character grid.
///
/// Every method must be callable any number of times within a frame with
/// consistent results until the next buffer mutation. `clear_dirty` is the
/// only mutation the renderer performs.
pub trait GridSnapshot {
    /// Grid dimensions as `(cols, rows)`.
    fn dims(&self) -> (u16, u16);

    /// Cursor position and buffer-level visibility.
    fn cursor(&self) -> CursorView;

    /// Cells of one row, left to right. Only queried for `row < rows`.
    fn line(&self, row: u16) -> &[Cell];

    /// Whether a row changed since the last `clear_dirty`.
    fn is_dirty(&self, row: u16) -> bool;

    /// Acknowledge all dirty rows.
    fn clear_dirty(&mut self);
}

/// Row-major cell buffer with per-line dirty bits.
#[derive(Debug, Clone)]
pub struct VecGrid {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    dirty: Vec<bool>,
    cursor: CursorView,
}

impl VecGrid {
    /// A blank grid. Every line starts dirty: fresh content has never been
    /// painted.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); cols as usize * rows as usize],
            dirty: vec![true; rows as usize],
            cursor: CursorView {
                col: 0,
                row: 0,
                visible: true,
            },
        }
    }

    #[must_use]
    pub fn cell(&self, col: u16, row: u16) -> Option<&Cell> {
        if col < self.cols && row < self.rows {
            self.cells.get(row as usize * self.cols as usize + col as usize)
        } else {
            None
        }
    }

    /// Store a cell and mark its line dirty. Out-of-bounds writes are
    /// ignored.
    pub fn set_cell(&mut self, col: u16, row: u16, cell: Cell) {
        if col >= self.cols || row >= self.rows {
            return;
        }
        self.cells[row as usize * self.cols as usize + col as usize] = cell;
        self.dirty[row as usize] = true;
    }

    /// Write a styled string starting at `(col, row)`, laying wide glyphs
    /// out as a leading cell plus a width-0 continuation. Zero-width
    /// characters are skipped (no combining support at this layer); output
    /// is clipped at the end of the row.
    pub fn put_str(&mut self, col: u16, row: u16, text: &str, fg: Color, bg: Color, flags: StyleFlags) {
        let mut col = col;
        for ch in text.chars() {
            if row >= self.rows || col >= self.cols {
                break;
            }
            match ch.width().unwrap_or(0) {
                0 => {}
                2 if col + 1 < self.cols => {
                    let (lead, cont) = Cell::wide(ch, fg, bg, flags);
                    self.set_cell(col, row, lead);
                    self.set_cell(col + 1, row, cont);
                    col += 2;
                }
                2 => {
                    // A wide glyph with no room for its continuation
                    // degrades to a styled blank in the last column.
                    self.set_cell(col, row, Cell::styled(' ', fg, bg, flags));
                    col += 1;
                }
                _ => {
                    self.set_cell(col, row, Cell::styled(ch, fg, bg, flags));
                    col += 1;
                }
            }
        }
    }

    /// Resize, preserving content top-left. All lines become dirty and the
    /// cursor is clamped into bounds.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let mut next = vec![Cell::default(); cols as usize * rows as usize];
        let keep_cols = self.cols.min(cols) as usize;
        for row in 0..self.rows.min(rows) as usize {
            let src = row * self.cols as usize;
            let dst = row * cols as usize;
            next[dst..dst + keep_cols].copy_from_slice(&self.cells[src..src + keep_cols]);
        }
        self.cells = next;
        self.cols = cols;
        self.rows = rows;
        self.dirty = vec![true; rows as usize];
        self.cursor.col = self.cursor.col.min(cols.saturating_sub(1));
        self.cursor.row = self.cursor.row.min(rows.saturating_sub(1));
    }

    /// Move the cursor. Cursor motion does not dirty any line; the renderer
    /// tracks cursor repaints itself.
    pub fn set_cursor(&mut self, col: u16, row: u16) {
        self.cursor.col = col.min(self.cols.saturating_sub(1));
        self.cursor.row = row.min(self.rows.saturating_sub(1));
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
    }

    pub fn mark_dirty(&mut self, row: u16) {
        if let Some(flag) = self.dirty.get_mut(row as usize) {
            *flag = true;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }
}

impl GridSnapshot for VecGrid {
    fn dims(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    fn cursor(&self) -> CursorView {
        self.cursor
    }

    fn line(&self, row: u16) -> &[Cell] {
        let start = row as usize * self.cols as usize;
        &self.cells[start..start + self.cols as usize]
    }

    fn is_dirty(&self, row: u16) -> bool {
        self.dirty.get(row as usize).copied().unwrap_or(false)
    }

    fn clear_dirty(&mut self) {
        self.dirty.fill(false);
    }
}
