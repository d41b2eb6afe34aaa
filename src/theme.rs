#![forbid(unsafe_code)]

//! Theme and palette: the named-color surface of the renderer.
//!
//! A [`Theme`] is total — every slot always holds a concrete [`Rgb`]. Hosts
//! never hand us a complete theme; they send a [`ThemePatch`] (any subset of
//! slots, camelCase JSON) which is merged over [`Theme::default`] so no slot
//! is ever undefined.
//!
//! The [`Palette`] is the derived, ordered 16-entry view of the theme's ANSI
//! slots that cell colors index into. It is rebuilt whenever the theme
//! changes and never mutated directly.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Complete named-color mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Default text color.
    pub foreground: Rgb,
    /// Default background color.
    pub background: Rgb,
    /// Cursor fill color.
    pub cursor: Rgb,
    /// Color of the glyph under a block cursor.
    pub cursor_accent: Rgb,
    /// Selection highlight background.
    pub selection_background: Rgb,
    /// Selection highlight text color.
    pub selection_foreground: Rgb,
    /// The 16 ANSI slots: standard 0–7, bright 8–15.
    pub ansi: [Rgb; 16],
}

impl Default for Theme {
    /// Stock xterm colors on a white-on-black base.
    fn default() -> Self {
        Self {
            foreground: Rgb::new(255, 255, 255),
            background: Rgb::new(0, 0, 0),
            cursor: Rgb::new(255, 255, 255),
            cursor_accent: Rgb::new(0, 0, 0),
            selection_background: Rgb::new(56, 139, 253),
            selection_foreground: Rgb::new(255, 255, 255),
            ansi: [
                Rgb::new(0, 0, 0),       // black
                Rgb::new(205, 0, 0),     // red
                Rgb::new(0, 205, 0),     // green
                Rgb::new(205, 205, 0),   // yellow
                Rgb::new(0, 0, 238),     // blue
                Rgb::new(205, 0, 205),   // magenta
                Rgb::new(0, 205, 205),   // cyan
                Rgb::new(229, 229, 229), // white
                Rgb::new(127, 127, 127), // bright black
                Rgb::new(255, 0, 0),     // bright red
                Rgb::new(0, 255, 0),     // bright green
                Rgb::new(255, 255, 0),   // bright yellow
                Rgb::new(92, 92, 255),   // bright blue
                Rgb::new(255, 0, 255),   // bright magenta
                Rgb::new(0, 255, 255),   // bright cyan
                Rgb::new(255, 255, 255), // bright white
            ],
        }
    }
}

impl Theme {
    /// Merge a partial theme over the complete default.
    ///
    /// Slots absent from the patch keep their default value, so the result
    /// is always total. Note the base is the *default* theme, not the
    /// currently active one: a patch is a full theme description with holes,
    /// not an incremental edit.
    #[must_use]
    pub fn from_patch(patch: &ThemePatch) -> Self {
        let mut theme = Self::default();
        let mut set = |slot: &mut Rgb, value: Option<Rgb>| {
            if let Some(v) = value {
                *slot = v;
            }
        };
        set(&mut theme.foreground, patch.foreground);
        set(&mut theme.background, patch.background);
        set(&mut theme.cursor, patch.cursor);
        set(&mut theme.cursor_accent, patch.cursor_accent);
        set(&mut theme.selection_background, patch.selection_background);
        set(&mut theme.selection_foreground, patch.selection_foreground);
        for (slot, value) in theme.ansi.iter_mut().zip(patch.ansi_slots()) {
            set(slot, value);
        }
        theme
    }

    /// Build the derived 16-entry palette from the ANSI slots.
    #[must_use]
    pub const fn palette(&self) -> Palette {
        Palette { colors: self.ansi }
    }
}

/// A partial theme: any subset of slots, merged over [`Theme::default`].
///
/// Field names follow the conventional web-terminal JSON form (camelCase,
/// one named field per ANSI slot). Unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemePatch {
    pub foreground: Option<Rgb>,
    pub background: Option<Rgb>,
    pub cursor: Option<Rgb>,
    pub cursor_accent: Option<Rgb>,
    pub selection_background: Option<Rgb>,
    pub selection_foreground: Option<Rgb>,
    pub black: Option<Rgb>,
    pub red: Option<Rgb>,
    pub green: Option<Rgb>,
    pub yellow: Option<Rgb>,
    pub blue: Option<Rgb>,
    pub magenta: Option<Rgb>,
    pub cyan: Option<Rgb>,
    pub white: Option<Rgb>,
    pub bright_black: Option<Rgb>,
    pub bright_red: Option<Rgb>,
    pub bright_green: Option<Rgb>,
    pub bright_yellow: Option<Rgb>,
    pub bright_blue: Option<Rgb>,
    pub bright_magenta: Option<Rgb>,
    pub bright_cyan: Option<Rgb>,
    pub bright_white: Option<Rgb>,
}

impl ThemePatch {
    /// ANSI slot overrides in palette order (0–15).
    fn ansi_slots(&self) -> [Option<Rgb>; 16] {
        [
            self.black,
            self.red,
            self.green,
            self.yellow,
            self.blue,
            self.magenta,
            self.cyan,
            self.white,
            self.bright_black,
            self.bright_red,
            self.bright_green,
            self.bright_yellow,
            self.bright_blue,
            self.bright_magenta,
            self.bright_cyan,
            self.bright_white,
        ]
    }
}

/// Ordered 16-color view derived from a theme's ANSI slots.
///
/// Index 0–15 maps 1:1 to the standard ANSI color numbers. Indices 16–255
/// are not modeled at this layer; lookups outside the range return `None`
/// and the caller falls back to the role default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgb; 16],
}

impl Palette {
    #[inline]
    #[must_use]
    pub fn get(&self, idx: u8) -> Option<Rgb> {
        self.colors.get(idx as usize).copied()
    }
}
