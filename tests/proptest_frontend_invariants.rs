//! Property-based invariant tests for the renderer and input encoder.
//!
//! Verifies:
//! 1.  Non-forced render repaints exactly the dirty line set (stationary
//!     cursor, blink off) and nothing else
//! 2.  Forced render repaints every line and leaves dirty bits untouched
//! 3.  A surface size mismatch forces a full repaint regardless of force_all
//! 4.  Wide-glyph continuation cells are never independently painted
//! 5.  Inverse swaps effective paint roles without mutating the stored cell
//! 6.  Printable keys emit exactly one chunk of that character's UTF-8
//! 7.  Ctrl+letter emits exactly one control byte (0x01..=0x1a)
//! 8.  Canonical keys emit their exact escape sequences
//! 9.  Clipboard chords emit nothing and pass through to the browser
//! 10. Paste emits the payload verbatim as one chunk; empty payloads emit
//!     nothing
//! 11. Disposed components stay inert and disposal is idempotent
//! 12. Theme patches merge over the complete default: every slot concrete
//! 13. Palette resolution falls back to the role default outside 0..=15
//! 14. Grid resize preserves the top-left content region and clamps the
//!     cursor

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use frankenterm_canvas::{
    Cell, Color, FontMetrics, GridSnapshot, InputEncoder, KeyDisposition, KeyEvent, Modifiers,
    PaintOp, RecordingSurface, RenderConfig, Renderer, Rgb, StyleFlags, Surface, Theme,
    ThemePatch, VecGrid, VtKeyEncoder,
};
use proptest::prelude::*;

// ── Harness helpers ───────────────────────────────────────────────────

fn test_renderer() -> Renderer<RecordingSurface> {
    Renderer::new(
        RecordingSurface::with_glyph_width(8.0),
        RenderConfig {
            font_size: 10.0,
            cursor_blink: false,
            ..RenderConfig::default()
        },
    )
}

/// Render twice so dirty bits and cursor tracking reach steady state, then
/// drain the op log.
fn settle(renderer: &mut Renderer<RecordingSurface>, grid: &mut VecGrid) {
    renderer.render(grid, false);
    renderer.render(grid, false);
    renderer.surface_mut().take_ops();
}

/// Rows whose full-width background clear appears in `ops`, ascending.
fn cleared_rows(ops: &[PaintOp], cols: u16, metrics: FontMetrics) -> Vec<u16> {
    let bg = Theme::default().background;
    let full = f64::from(cols) * metrics.width;
    let mut rows: Vec<u16> = ops
        .iter()
        .filter_map(|op| match op {
            PaintOp::FillRect {
                x,
                y,
                width,
                height,
                color,
                ..
            } if *x == 0.0 && *width == full && *height == metrics.height && *color == bg => {
                Some((*y / metrics.height) as u16)
            }
            _ => None,
        })
        .collect();
    rows.sort_unstable();
    rows.dedup();
    rows
}

type Chunks = Rc<RefCell<Vec<Vec<u8>>>>;

fn encoder_harness() -> (InputEncoder<VtKeyEncoder>, Chunks) {
    let chunks: Chunks = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&chunks);
    let encoder = InputEncoder::new(
        VtKeyEncoder,
        move |bytes: &[u8]| sink.borrow_mut().push(bytes.to_vec()),
        || {},
    );
    (encoder, chunks)
}

fn key(identifier: &str, mods: Modifiers) -> KeyEvent {
    KeyEvent::new(identifier, identifier, mods)
}

// ── Strategy helpers ──────────────────────────────────────────────────

fn arb_grid_and_dirty() -> impl Strategy<Value = (u16, u16, BTreeSet<u16>)> {
    (2u16..=10, 2u16..=8).prop_flat_map(|(cols, rows)| {
        proptest::collection::btree_set(0..rows, 0..=rows as usize)
            .prop_map(move |dirty| (cols, rows, dirty))
    })
}

fn arb_rgb() -> impl Strategy<Value = Rgb> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgb::new(r, g, b))
}

fn arb_color() -> impl Strategy<Value = Color> {
    prop_oneof![
        Just(Color::Default),
        any::<u8>().prop_map(Color::Palette),
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Color::Rgb(r, g, b)),
    ]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Non-forced render repaints exactly the dirty set
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn repaints_exactly_the_dirty_set((cols, rows, dirty) in arb_grid_and_dirty()) {
        let mut renderer = test_renderer();
        let mut grid = VecGrid::new(cols, rows);
        settle(&mut renderer, &mut grid);

        for &row in &dirty {
            grid.mark_dirty(row);
        }
        let stats = renderer.render(&mut grid, false);
        prop_assert_eq!(stats.lines_repainted, dirty.len() as u32);
        prop_assert!(!stats.forced_full);

        let ops = renderer.surface_mut().take_ops();
        let expected: Vec<u16> = dirty.iter().copied().collect();
        prop_assert_eq!(cleared_rows(&ops, cols, renderer.metrics()), expected);

        // The pass consumed the dirty bits.
        for row in 0..rows {
            prop_assert!(!grid.is_dirty(row));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Forced render repaints everything and leaves dirty bits untouched
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn forced_render_is_full_and_preserves_dirty((cols, rows, dirty) in arb_grid_and_dirty()) {
        let mut renderer = test_renderer();
        let mut grid = VecGrid::new(cols, rows);
        settle(&mut renderer, &mut grid);

        for &row in &dirty {
            grid.mark_dirty(row);
        }
        let stats = renderer.render(&mut grid, true);
        prop_assert!(stats.forced_full);
        prop_assert_eq!(stats.lines_repainted, u32::from(rows));

        for &row in &dirty {
            prop_assert!(grid.is_dirty(row), "forced pass must not clear row {}", row);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Size mismatch forces a full repaint regardless of force_all
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn size_mismatch_forces_full_repaint(
        (cols, rows, _) in arb_grid_and_dirty(),
        dpr in prop_oneof![Just(1.5f64), Just(2.0), Just(3.0)],
    ) {
        let mut renderer = test_renderer();
        let mut grid = VecGrid::new(cols, rows);
        settle(&mut renderer, &mut grid);

        // No line is dirty; only the device-pixel ratio changed.
        renderer.set_dpr(dpr);
        let stats = renderer.render(&mut grid, false);
        prop_assert!(stats.forced_full);
        prop_assert_eq!(stats.lines_repainted, u32::from(rows));

        let expected_width = (f64::from(cols) * renderer.metrics().width * dpr).round() as u32;
        prop_assert_eq!(renderer.surface().device_size().0, expected_width);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Continuation cells are never independently painted
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn continuation_cells_never_painted(cols in 3u16..=10, col in 0u16..=7) {
        prop_assume!(col + 1 < cols);
        let mut renderer = test_renderer();
        let mut grid = VecGrid::new(cols, 1);
        grid.put_str(col, 0, "世", Color::Default, Color::Default, StyleFlags::empty());
        settle(&mut renderer, &mut grid);

        grid.mark_dirty(0);
        renderer.render(&mut grid, false);
        let ops = renderer.surface_mut().take_ops();

        let continuation_x = f64::from(col + 1) * renderer.metrics().width;
        let wide_glyphs = ops
            .iter()
            .filter(|op| matches!(op, PaintOp::FillText { text, .. } if text == "世"))
            .count();
        prop_assert_eq!(wide_glyphs, 1);
        prop_assert!(
            !ops.iter().any(|op| matches!(
                op,
                PaintOp::FillText { x, .. } if *x == continuation_x
            )),
            "no glyph may anchor at the continuation column"
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Inverse swaps effective paint roles without mutating the cell
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn inverse_swaps_roles_not_storage(fg in arb_color(), bg in arb_color()) {
        let mut renderer = test_renderer();
        let mut grid = VecGrid::new(1, 1);
        grid.set_cell(0, 0, Cell::styled('x', fg, bg, StyleFlags::INVERSE));
        settle(&mut renderer, &mut grid);

        grid.mark_dirty(0);
        renderer.render(&mut grid, false);
        let ops = renderer.surface_mut().take_ops();

        let theme = Theme::default();
        let palette = theme.palette();
        let resolved_fg = fg.resolve(theme.foreground, &palette);
        let resolved_bg = bg.resolve(theme.background, &palette);

        // Glyph painted in the resolved background-role color, cell fill in
        // the resolved foreground-role color.
        let glyph_uses_bg_role = ops.iter().any(|op| matches!(
            op,
            PaintOp::FillText { text, color, .. } if text == "x" && *color == resolved_bg
        ));
        prop_assert!(glyph_uses_bg_role);
        let fill_uses_fg_role = ops.iter().any(|op| matches!(
            op,
            PaintOp::FillRect { x, width, height, color, .. }
                if *x == 0.0 && *width == 8.0 && *height == 12.0 && *color == resolved_fg
        ));
        prop_assert!(fill_uses_fg_role);

        let stored = grid.cell(0, 0).unwrap();
        prop_assert_eq!(stored.fg, fg);
        prop_assert_eq!(stored.bg, bg);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Printable keys emit exactly one chunk of UTF-8
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn printable_keys_emit_exact_utf8(
        ch in proptest::char::range('!', '~'),
        shift in any::<bool>(),
    ) {
        let (mut encoder, chunks) = encoder_harness();
        let mods = if shift { Modifiers::SHIFT } else { Modifiers::empty() };
        let disposition = encoder.handle_keydown(&key(&ch.to_string(), mods));
        prop_assert_eq!(disposition, KeyDisposition::Suppress);
        let sent = chunks.borrow();
        prop_assert_eq!(sent.as_slice(), &[ch.to_string().into_bytes()]);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Ctrl+letter emits exactly one control byte
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn ctrl_letter_emits_one_control_byte(ch in proptest::char::range('a', 'z')) {
        let (mut encoder, chunks) = encoder_harness();
        encoder.handle_keydown(&key(&ch.to_string(), Modifiers::CTRL));
        let expected = (u32::from(ch) as u8) - b'a' + 1;
        let sent = chunks.borrow();
        prop_assert_eq!(sent.as_slice(), &[vec![expected]]);
    }

    #[test]
    fn ctrl_shift_letter_emits_same_control_byte(ch in proptest::char::range('A', 'Z')) {
        let (mut encoder, chunks) = encoder_harness();
        encoder.handle_keydown(&key(&ch.to_string(), Modifiers::CTRL | Modifiers::SHIFT));
        let expected = (u32::from(ch) as u8) - b'A' + 1;
        let sent = chunks.borrow();
        prop_assert_eq!(sent.as_slice(), &[vec![expected]]);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Canonical keys emit their exact sequences
// ═════════════════════════════════════════════════════════════════════════

const CANONICAL: &[(&str, &[u8])] = &[
    ("Enter", b"\r"),
    ("Tab", b"\t"),
    ("Escape", b"\x1b"),
    ("Backspace", b"\x7f"),
    ("ArrowUp", b"\x1b[A"),
    ("ArrowDown", b"\x1b[B"),
    ("ArrowRight", b"\x1b[C"),
    ("ArrowLeft", b"\x1b[D"),
    ("Home", b"\x1b[H"),
    ("End", b"\x1b[F"),
    ("Insert", b"\x1b[2~"),
    ("Delete", b"\x1b[3~"),
    ("PageUp", b"\x1b[5~"),
    ("PageDown", b"\x1b[6~"),
    ("F1", b"\x1bOP"),
    ("F2", b"\x1bOQ"),
    ("F3", b"\x1bOR"),
    ("F4", b"\x1bOS"),
    ("F5", b"\x1b[15~"),
    ("F6", b"\x1b[17~"),
    ("F7", b"\x1b[18~"),
    ("F8", b"\x1b[19~"),
    ("F9", b"\x1b[20~"),
    ("F10", b"\x1b[21~"),
    ("F11", b"\x1b[23~"),
    ("F12", b"\x1b[24~"),
];

proptest! {
    #[test]
    fn canonical_keys_emit_exact_sequences(
        entry in proptest::sample::select(CANONICAL),
        shift in any::<bool>(),
    ) {
        let (identifier, expected) = entry;
        let (mut encoder, chunks) = encoder_harness();
        let mods = if shift { Modifiers::SHIFT } else { Modifiers::empty() };
        let disposition = encoder.handle_keydown(&key(identifier, mods));
        prop_assert_eq!(disposition, KeyDisposition::Suppress);
        let sent = chunks.borrow();
        prop_assert_eq!(sent.as_slice(), &[expected.to_vec()]);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 9. Clipboard chords emit nothing and pass through
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn clipboard_chords_pass_through(
        chord_mods in prop_oneof![
            Just(Modifiers::CTRL),
            Just(Modifiers::SUPER),
            Just(Modifiers::CTRL | Modifiers::SHIFT),
        ],
        upper in any::<bool>(),
    ) {
        let (mut encoder, chunks) = encoder_harness();
        let identifier = if upper { "V" } else { "v" };
        let disposition = encoder.handle_keydown(&key(identifier, chord_mods));
        prop_assert_eq!(disposition, KeyDisposition::Passthrough);

        let copy = encoder.handle_keydown(&key("c", Modifiers::SUPER));
        prop_assert_eq!(copy, KeyDisposition::Passthrough);
        prop_assert!(chunks.borrow().is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 10. Paste emits the payload verbatim as one chunk
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn paste_emits_payload_verbatim(payload in "[ -~]{1,64}") {
        let (mut encoder, chunks) = encoder_harness();
        encoder.handle_paste(Some(&payload));
        let sent = chunks.borrow();
        prop_assert_eq!(sent.as_slice(), &[payload.into_bytes()]);
    }

    #[test]
    fn empty_paste_emits_nothing(has_payload in any::<bool>()) {
        let (mut encoder, chunks) = encoder_harness();
        encoder.handle_paste(if has_payload { Some("") } else { None });
        prop_assert!(chunks.borrow().is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 11. Disposed components stay inert; disposal is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn disposal_is_inert_and_idempotent(
        ch in proptest::char::range('a', 'z'),
        mods in (0u8..16).prop_map(Modifiers::from_bits_truncate_u8),
        repeat in 1usize..4,
    ) {
        let (mut encoder, chunks) = encoder_harness();
        for _ in 0..repeat {
            encoder.dispose();
        }
        prop_assert!(!encoder.is_active());

        let disposition = encoder.handle_keydown(&key(&ch.to_string(), mods));
        prop_assert_eq!(disposition, KeyDisposition::Passthrough);
        encoder.handle_paste(Some("data"));
        prop_assert!(chunks.borrow().is_empty());

        let mut renderer = test_renderer();
        for _ in 0..repeat {
            renderer.dispose();
        }
        prop_assert!(renderer.is_disposed());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 12. Theme patches merge over the complete default
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn theme_patch_merges_over_default(
        foreground in proptest::option::of(arb_rgb()),
        background in proptest::option::of(arb_rgb()),
        red in proptest::option::of(arb_rgb()),
    ) {
        let patch = ThemePatch {
            foreground,
            background,
            red,
            ..ThemePatch::default()
        };
        let theme = Theme::from_patch(&patch);
        let stock = Theme::default();

        prop_assert_eq!(theme.foreground, foreground.unwrap_or(stock.foreground));
        prop_assert_eq!(theme.background, background.unwrap_or(stock.background));
        prop_assert_eq!(theme.ansi[1], red.unwrap_or(stock.ansi[1]));
        // Untouched slots stay at their defaults: no slot is ever undefined.
        prop_assert_eq!(theme.cursor, stock.cursor);
        prop_assert_eq!(theme.ansi[4], stock.ansi[4]);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 13. Palette resolution falls back outside 0..=15
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn palette_resolution_falls_back(index in any::<u8>(), role_default in arb_rgb()) {
        let theme = Theme::default();
        let palette = theme.palette();
        let resolved = Color::Palette(index).resolve(role_default, &palette);
        if index < 16 {
            prop_assert_eq!(resolved, theme.ansi[index as usize]);
        } else {
            prop_assert_eq!(resolved, role_default);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 14. Grid resize preserves top-left content and clamps the cursor
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn resize_preserves_top_left_and_clamps_cursor(
        cols in 2u16..=12,
        rows in 2u16..=8,
        new_cols in 1u16..=12,
        new_rows in 1u16..=8,
    ) {
        let mut grid = VecGrid::new(cols, rows);
        grid.set_cell(0, 0, Cell::new('X'));
        grid.set_cursor(cols - 1, rows - 1);

        grid.resize(new_cols, new_rows);
        prop_assert_eq!(grid.dims(), (new_cols, new_rows));
        prop_assert_eq!(grid.cell(0, 0).unwrap().content(), 'X');

        let cursor = grid.cursor();
        prop_assert!(cursor.col < new_cols);
        prop_assert!(cursor.row < new_rows);

        // Everything is dirty after a resize.
        for row in 0..new_rows {
            prop_assert!(grid.is_dirty(row));
        }
    }
}
