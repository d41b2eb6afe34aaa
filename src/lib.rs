#![forbid(unsafe_code)]

//! Canvas-based terminal frontend: a dirty-aware cell renderer and a
//! keyboard-to-protocol input encoder.
//!
//! The crate sits between a terminal-state engine (which owns the
//! authoritative grid and its dirty bookkeeping) and a transport (which
//! carries encoded bytes to a remote process):
//!
//! - [`Renderer`] paints a [`GridSnapshot`] onto a [`Surface`], repainting
//!   only changed lines plus the cursor's trail, so redraw cost scales with
//!   what changed rather than grid size;
//! - [`InputEncoder`] classifies each physical key or clipboard event into
//!   exactly one handling path: clipboard-chord passthrough, literal
//!   character, canonical escape sequence, or [`AdvancedEncoder`]
//!   delegation.
//!
//! Both components run on one cooperative event loop and share nothing
//! across threads. Native builds expose the full core for tests and
//! benches; the `wasm32` target adds the canvas surface, DOM event wiring,
//! and the JS-facing `TermCanvas` class.

pub mod cell;
pub mod color;
pub mod grid;
pub mod input;
pub mod render;
pub mod surface;
pub mod theme;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use cell::{Cell, StyleFlags};
pub use color::{Color, Rgb};
pub use grid::{CursorView, GridSnapshot, VecGrid};
pub use input::{
    AdvancedEncoder, EncodeError, EncodeRequest, InputEncoder, Key, KeyAction, KeyDisposition,
    KeyEvent, Modifiers, VtKeyEncoder,
};
pub use render::{
    BLINK_INTERVAL_MS, BlinkFlag, CursorStyle, FrameStats, RenderConfig, Renderer, TermOptions,
};
pub use surface::{FontMetrics, PaintOp, RecordingSurface, RendererError, Surface};
pub use theme::{Palette, Theme, ThemePatch};

#[cfg(target_arch = "wasm32")]
pub use wasm::{CanvasSurface, TermCanvas};
