#![forbid(unsafe_code)]

//! Grid cell: one renderable position of the character grid.
//!
//! A cell stores a display character, foreground/background [`Color`]s, a
//! [`StyleFlags`] set, and a display width. Width encodes the wide-glyph
//! layout directly:
//!
//! - `1` — a normal glyph,
//! - `2` — the leading cell of a wide (two-column) glyph,
//! - `0` — the trailing continuation cell of a wide glyph.
//!
//! Invariant: a width-0 cell carries no independently renderable content and
//! is never painted; its pixels belong to the preceding leading cell.

use bitflags::bitflags;

use crate::color::Color;

bitflags! {
    /// Per-cell text style flags.
    ///
    /// This is the renderer's paint vocabulary, not the full SGR attribute
    /// space; only styles this layer actually draws are modeled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const UNDERLINE     = 1 << 2;
        const STRIKETHROUGH = 1 << 3;
        /// Rendered at 50% alpha (SGR "dim").
        const FAINT         = 1 << 4;
        /// Background still paints; glyph and decorations do not.
        const INVISIBLE     = 1 << 5;
        /// Swaps fg/bg paint roles; stored colors are untouched.
        const INVERSE       = 1 << 6;
    }
}

/// One grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    ch: char,
    width: u8,
    pub fg: Color,
    pub bg: Color,
    pub flags: StyleFlags,
}

impl Cell {
    /// A narrow (width-1) cell with default colors and no styles.
    ///
    /// Wide glyphs must go through [`Cell::wide`]; this constructor declares
    /// the character narrow regardless of its Unicode width.
    #[must_use]
    pub const fn new(ch: char) -> Self {
        Self {
            ch,
            width: 1,
            fg: Color::Default,
            bg: Color::Default,
            flags: StyleFlags::empty(),
        }
    }

    /// A narrow cell with explicit colors and styles.
    #[must_use]
    pub const fn styled(ch: char, fg: Color, bg: Color, flags: StyleFlags) -> Self {
        Self {
            ch,
            width: 1,
            fg,
            bg,
            flags,
        }
    }

    /// Build the (leading, continuation) pair for a wide glyph.
    ///
    /// The leading cell has width 2 and carries the character; the
    /// continuation has width 0, blank content, and the same attributes so
    /// background/selection painting stays uniform across both columns.
    #[must_use]
    pub const fn wide(ch: char, fg: Color, bg: Color, flags: StyleFlags) -> (Self, Self) {
        let leading = Self {
            ch,
            width: 2,
            fg,
            bg,
            flags,
        };
        let continuation = Self {
            ch: ' ',
            width: 0,
            fg,
            bg,
            flags,
        };
        (leading, continuation)
    }

    /// The display character.
    #[inline]
    #[must_use]
    pub const fn content(&self) -> char {
        self.ch
    }

    /// Display width: 1 normal, 2 wide leading, 0 wide continuation.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        self.width == 2
    }

    #[inline]
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

impl Default for Cell {
    /// A blank: space, width 1, default colors, no styles.
    fn default() -> Self {
        Self::new(' ')
    }
}
