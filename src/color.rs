#![forbid(unsafe_code)]

//! Color model for cell painting.
//!
//! Two layers:
//! - [`Rgb`]: a concrete sRGB triplet — the only thing the drawing surface
//!   understands (formatted as `#rrggbb` CSS hex).
//! - [`Color`]: the per-cell tagged color — terminal default, one of the 16
//!   modeled palette slots, or an explicit RGB value.
//!
//! Cells store [`Color`]; resolution to [`Rgb`] happens at paint time against
//! the active theme and palette, never at storage time. That keeps theme
//! switches cheap (no grid rewrite) and keeps the inverse-video swap a pure
//! role exchange.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::theme::Palette;

/// A concrete sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` or `#rgb` CSS hex string.
    ///
    /// Theme patches carry colors in this form. Anything else returns `None`.
    #[must_use]
    pub fn parse_css(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::new(r, g, b))
            }
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
                // Shorthand doubles each nibble: #f80 == #ff8800.
                Some(Self::new(r * 17, g * 17, b * 17))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Rgb {
    /// CSS hex form (`#rrggbb`), the fill-style format of the 2D canvas API.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_css(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid CSS hex color: {s:?}")))
    }
}

/// Per-cell color reference.
///
/// Models the terminal color hierarchy at the fidelity this layer needs:
/// default → 16 palette slots → 24-bit RGB. Indices 16–255 are not modeled;
/// a palette reference outside 0–15 resolves to the role's default color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Role default: theme foreground or background, depending on whether
    /// the value sits in a cell's fg or bg slot.
    #[default]
    Default,
    /// Palette slot (0–15): standard 8 + bright 8.
    Palette(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb(r, g, b)
    }

    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// Resolve to a concrete color given the role's default and the active
    /// palette. Out-of-range palette indices fall back to the role default.
    #[must_use]
    pub fn resolve(self, role_default: Rgb, palette: &Palette) -> Rgb {
        match self {
            Self::Default => role_default,
            Self::Palette(idx) => palette.get(idx).unwrap_or(role_default),
            Self::Rgb(r, g, b) => Rgb::new(r, g, b),
        }
    }
}
