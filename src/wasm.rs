#![forbid(unsafe_code)]

//! Browser embedding: canvas-backed surface, DOM event wiring, and the
//! JS-facing [`TermCanvas`] class.
//!
//! Everything DOM-specific lives here; the renderer and encoder cores are
//! target-independent. The blink interval and both event listeners are
//! owned handles, released exactly once on [`TermCanvas::dispose`].

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, ClipboardEvent, HtmlCanvasElement, KeyboardEvent};

use crate::cell::StyleFlags;
use crate::color::{Color, Rgb};
use crate::grid::VecGrid;
use crate::input::{InputEncoder, KeyDisposition, KeyEvent, Modifiers, VtKeyEncoder};
use crate::render::{BLINK_INTERVAL_MS, BlinkFlag, RenderConfig, Renderer, TermOptions};
use crate::surface::{RendererError, Surface};

/// [`Surface`] over a `CanvasRenderingContext2d`.
///
/// The context is acquired opaque (`alpha: false`) so the compositor never
/// blends the terminal with the page behind it.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// Acquire the 2D context from an existing `<canvas>`. Fatal if the
    /// element cannot provide one; no surface value exists on failure.
    pub fn from_canvas(canvas: HtmlCanvasElement) -> Result<Self, RendererError> {
        let options = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&options, &JsValue::from_str("alpha"), &JsValue::FALSE);
        let ctx = canvas
            .get_context_with_context_options("2d", &options)
            .map_err(|err| RendererError::Surface(format!("{err:?}")))?
            .ok_or(RendererError::ContextUnavailable)?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| RendererError::ContextUnavailable)?;
        ctx.set_text_baseline("alphabetic");
        Ok(Self { canvas, ctx })
    }
}

impl Surface for CanvasSurface {
    fn device_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn resize(&mut self, logical_width: f64, logical_height: f64, dpr: f64) {
        self.canvas.set_width((logical_width * dpr).round() as u32);
        self.canvas.set_height((logical_height * dpr).round() as u32);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{logical_width}px"));
        let _ = style.set_property("height", &format!("{logical_height}px"));
        // Assigning the backing-store size reset the context; re-establish
        // the logical coordinate system and text anchoring.
        let _ = self.ctx.scale(dpr, dpr);
        self.ctx.set_text_baseline("alphabetic");
        self.ctx.set_global_alpha(1.0);
    }

    fn set_font(&mut self, font: &str) {
        self.ctx.set_font(font);
    }

    fn set_fill(&mut self, color: Rgb) {
        self.ctx.set_fill_style_str(&color.to_string());
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.ctx.set_global_alpha(alpha);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.ctx.fill_rect(x, y, width, height);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let _ = self.ctx.fill_text(text, x, y);
    }

    fn measure_text(&mut self, text: &str) -> f64 {
        self.ctx
            .measure_text(text)
            .map_or(0.0, |metrics| metrics.width())
    }
}

/// Owned blink interval. Cleared exactly once, when dropped.
struct BlinkTimer {
    id: i32,
    _closure: Closure<dyn FnMut()>,
}

impl BlinkTimer {
    fn start(flag: BlinkFlag) -> Option<Self> {
        let window = web_sys::window()?;
        let closure = Closure::<dyn FnMut()>::new(move || flag.toggle());
        let id = window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                BLINK_INTERVAL_MS as i32,
            )
            .ok()?;
        Some(Self {
            id,
            _closure: closure,
        })
    }
}

impl Drop for BlinkTimer {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.id);
        }
    }
}

fn parse_options(options: &JsValue) -> Result<TermOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(TermOptions::default());
    }
    let json = String::from(js_sys::JSON::stringify(options)?);
    serde_json::from_str(&json).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn key_event_from_dom(event: &KeyboardEvent) -> KeyEvent {
    let mut mods = Modifiers::empty();
    if event.shift_key() {
        mods |= Modifiers::SHIFT;
    }
    if event.alt_key() {
        mods |= Modifiers::ALT;
    }
    if event.ctrl_key() {
        mods |= Modifiers::CTRL;
    }
    if event.meta_key() {
        mods |= Modifiers::SUPER;
    }
    KeyEvent::new(&event.key(), &event.code(), mods)
}

/// JS-facing terminal canvas: a renderer over one `<canvas>`, an input
/// encoder wired to its `keydown`/`paste` events, and a local grid buffer.
#[wasm_bindgen]
pub struct TermCanvas {
    renderer: Rc<RefCell<Renderer<CanvasSurface>>>,
    grid: Rc<RefCell<VecGrid>>,
    encoder: Rc<RefCell<InputEncoder<VtKeyEncoder>>>,
    canvas: HtmlCanvasElement,
    keydown: Option<Closure<dyn FnMut(KeyboardEvent)>>,
    paste: Option<Closure<dyn FnMut(ClipboardEvent)>>,
    blink: Option<BlinkTimer>,
}

#[wasm_bindgen]
impl TermCanvas {
    /// Build a terminal canvas over an existing `<canvas>` element.
    ///
    /// `options` is a plain object (camelCase, any subset of fontSize,
    /// fontFamily, cursorStyle, cursorBlink, theme, devicePixelRatio).
    /// `on_output` receives encoded bytes as a `Uint8Array`; `on_bell` and
    /// `on_raw_key` are optional.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        options: JsValue,
        on_output: js_sys::Function,
        on_bell: Option<js_sys::Function>,
        on_raw_key: Option<js_sys::Function>,
    ) -> Result<TermCanvas, JsValue> {
        let parsed = parse_options(&options)?;
        let mut config = RenderConfig::default();
        if let Some(window) = web_sys::window() {
            config.dpr = window.device_pixel_ratio();
        }
        config.apply(&parsed);

        let surface = CanvasSurface::from_canvas(canvas.clone())
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let renderer = Renderer::new(surface, config);

        let output_cb = move |bytes: &[u8]| {
            let array = js_sys::Uint8Array::from(bytes);
            let _ = on_output.call1(&JsValue::NULL, &array.into());
        };
        let bell_cb = move || {
            if let Some(function) = &on_bell {
                let _ = function.call0(&JsValue::NULL);
            }
        };
        let mut encoder = InputEncoder::new(VtKeyEncoder, output_cb, bell_cb);
        if let Some(function) = on_raw_key {
            encoder = encoder.with_raw_key_observer(move |event: &KeyEvent| {
                let _ = function.call3(
                    &JsValue::NULL,
                    &JsValue::from_str(&event.key),
                    &JsValue::from_str(&event.code),
                    &JsValue::from_f64(f64::from(event.mods.bits())),
                );
            });
        }

        let mut term = TermCanvas {
            renderer: Rc::new(RefCell::new(renderer)),
            grid: Rc::new(RefCell::new(VecGrid::new(0, 0))),
            encoder: Rc::new(RefCell::new(encoder)),
            canvas,
            keydown: None,
            paste: None,
            blink: None,
        };
        term.attach_listeners()?;
        term.sync_blink();
        Ok(term)
    }

    fn attach_listeners(&mut self) -> Result<(), JsValue> {
        let encoder = Rc::clone(&self.encoder);
        let keydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            let key_event = key_event_from_dom(&event);
            match encoder.borrow_mut().handle_keydown(&key_event) {
                KeyDisposition::Passthrough => {}
                KeyDisposition::Suppress => event.prevent_default(),
                KeyDisposition::SuppressAndStop => {
                    event.prevent_default();
                    event.stop_propagation();
                }
            }
        });
        self.canvas
            .add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
        self.keydown = Some(keydown);

        let encoder = Rc::clone(&self.encoder);
        let paste = Closure::<dyn FnMut(ClipboardEvent)>::new(move |event: ClipboardEvent| {
            event.prevent_default();
            let payload = event
                .clipboard_data()
                .and_then(|data| data.get_data("text/plain").ok());
            encoder.borrow_mut().handle_paste(payload.as_deref());
        });
        self.canvas
            .add_event_listener_with_callback("paste", paste.as_ref().unchecked_ref())?;
        self.paste = Some(paste);

        // Keyboard events only reach a focusable element.
        self.canvas.set_tab_index(0);
        Ok(())
    }

    fn sync_blink(&mut self) {
        let enabled = self.renderer.borrow().blink_enabled();
        if enabled && self.blink.is_none() {
            let flag = self.renderer.borrow().blink_flag();
            self.blink = BlinkTimer::start(flag);
        } else if !enabled {
            self.blink = None;
        }
    }

    /// Resize the grid; the next render sizes the canvas to match.
    pub fn resize(&self, cols: u16, rows: u16) {
        self.grid.borrow_mut().resize(cols, rows);
    }

    /// Paint one frame. Returns the number of lines repainted.
    pub fn render(&self, force_all: bool) -> u32 {
        let mut grid = self.grid.borrow_mut();
        self.renderer
            .borrow_mut()
            .render(&mut *grid, force_all)
            .lines_repainted
    }

    /// Write text into the grid at a cell position, default colors.
    #[wasm_bindgen(js_name = putText)]
    pub fn put_text(&self, col: u16, row: u16, text: &str) {
        self.grid.borrow_mut().put_str(
            col,
            row,
            text,
            Color::Default,
            Color::Default,
            StyleFlags::empty(),
        );
    }

    /// Move the cursor and set its buffer-level visibility.
    #[wasm_bindgen(js_name = setCursor)]
    pub fn set_cursor(&self, col: u16, row: u16, visible: bool) {
        let mut grid = self.grid.borrow_mut();
        grid.set_cursor(col, row);
        grid.set_cursor_visible(visible);
    }

    /// Fold an options patch over the live configuration and schedule a
    /// repaint through the dirty bits.
    #[wasm_bindgen(js_name = applyOptions)]
    pub fn apply_options(&mut self, options: JsValue) -> Result<(), JsValue> {
        let parsed = parse_options(&options)?;
        self.renderer.borrow_mut().apply_options(&parsed);
        self.sync_blink();
        self.grid.borrow_mut().mark_all_dirty();
        Ok(())
    }

    /// Re-measure font metrics after an external font load settles.
    #[wasm_bindgen(js_name = refreshMetrics)]
    pub fn refresh_metrics(&self) {
        self.renderer.borrow_mut().refresh_metrics();
    }

    /// Replace (or clear, by passing nothing) the custom key override. The
    /// handler receives `(key, code, modsBits)` and claims the event by
    /// returning true.
    #[wasm_bindgen(js_name = setCustomKeyHandler)]
    pub fn set_custom_key_handler(&self, handler: Option<js_sys::Function>) {
        let wrapped = handler.map(|function| {
            Box::new(move |event: &KeyEvent| {
                function
                    .call3(
                        &JsValue::NULL,
                        &JsValue::from_str(&event.key),
                        &JsValue::from_str(&event.code),
                        &JsValue::from_f64(f64::from(event.mods.bits())),
                    )
                    .is_ok_and(|value| value.as_bool().unwrap_or(false))
            }) as Box<dyn FnMut(&KeyEvent) -> bool>
        });
        self.encoder.borrow_mut().set_custom_key_handler(wrapped);
    }

    /// Cell advance width in logical pixels, for host layout math.
    #[wasm_bindgen(js_name = cellWidth)]
    pub fn cell_width(&self) -> f64 {
        self.renderer.borrow().metrics().width
    }

    /// Cell height in logical pixels, for host layout math.
    #[wasm_bindgen(js_name = cellHeight)]
    pub fn cell_height(&self) -> f64 {
        self.renderer.borrow().metrics().height
    }

    /// Focus the canvas so it receives keyboard events.
    pub fn focus(&self) {
        let _ = self.canvas.focus();
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.encoder.borrow().is_active()
    }

    /// Tear down listeners, the blink interval, and both components.
    /// Idempotent; events arriving afterward are ignored.
    pub fn dispose(&mut self) {
        if let Some(closure) = self.keydown.take() {
            let _ = self
                .canvas
                .remove_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        }
        if let Some(closure) = self.paste.take() {
            let _ = self
                .canvas
                .remove_event_listener_with_callback("paste", closure.as_ref().unchecked_ref());
        }
        self.blink = None;
        self.encoder.borrow_mut().dispose();
        self.renderer.borrow_mut().dispose();
    }
}
