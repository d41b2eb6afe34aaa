#![forbid(unsafe_code)]

//! Keyboard-to-protocol input encoding.
//!
//! Classifies each physical key event into exactly one handling path, in
//! order:
//!
//! 1. raw-key observer notification (unconditional),
//! 2. custom override,
//! 3. native clipboard chords (left to the browser),
//! 4. printable characters (emitted literally),
//! 5. the static binding table plus canonical escape sequences,
//! 6. the pluggable [`AdvancedEncoder`] for complex modifier combinations.
//!
//! The encoder owns no DOM listeners; the host feeds it [`KeyEvent`]s and
//! applies the returned [`KeyDisposition`] to the browser event.

use std::fmt;

use bitflags::bitflags;

#[cfg(feature = "tracing")]
use tracing::warn;

bitflags! {
    /// Modifier keys held during a key event, derived fresh per event.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

impl Modifiers {
    #[must_use]
    pub const fn from_bits_truncate_u8(bits: u8) -> Self {
        Self::from_bits_truncate(bits)
    }
}

/// Logical key code produced by the static binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

/// One physical key event as the host observed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Logical key identifier, layout- and shift-affected (`"a"`, `"A"`,
    /// `"Enter"`, `"ArrowUp"`).
    pub key: String,
    /// Physical key position identifier (`"KeyA"`), carried for observers.
    pub code: String,
    pub mods: Modifiers,
}

impl KeyEvent {
    #[must_use]
    pub fn new(key: &str, code: &str, mods: Modifiers) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            mods,
        }
    }
}

/// What the host should do with the browser event after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Leave default behavior alone (clipboard chords, unmapped keys).
    Passthrough,
    /// Prevent the default action.
    Suppress,
    /// Prevent the default action and stop propagation.
    SuppressAndStop,
}

/// Key event phase passed to the advanced encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Press,
    Release,
}

/// One advanced-encoding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeRequest {
    pub action: KeyAction,
    pub key: Key,
    pub mods: Modifiers,
    /// Lower-cased base character for single printable ASCII keys, so
    /// control-character derivation downstream sees `ctrl+a` whether the
    /// event carried `a` or `A`.
    pub literal_hint: Option<char>,
}

/// Advanced-encoder failure. Recovered locally by the input path: logged,
/// no bytes emitted, handling continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The combination has no representation in the target protocol.
    Unsupported,
    Failed(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported key combination"),
            Self::Failed(msg) => write!(f, "key encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// External capability producing protocol-correct byte sequences for
/// key/modifier combinations beyond the canonical table.
pub trait AdvancedEncoder {
    fn encode(&mut self, request: &EncodeRequest) -> Result<Vec<u8>, EncodeError>;
}

/// Static binding table: one physical-key identifier to one logical key.
/// Consulted, never mutated; unmapped identifiers return `None`.
#[must_use]
pub fn lookup_key(identifier: &str) -> Option<Key> {
    // Single-character identifiers are the key's produced character itself.
    let mut chars = identifier.chars();
    if let Some(first) = chars.next()
        && chars.next().is_none()
    {
        return Some(Key::Char(first));
    }

    match identifier {
        "Enter" => Some(Key::Enter),
        "Escape" | "Esc" => Some(Key::Escape),
        "Backspace" => Some(Key::Backspace),
        "Tab" => Some(Key::Tab),
        "Delete" => Some(Key::Delete),
        "Insert" => Some(Key::Insert),
        "Home" => Some(Key::Home),
        "End" => Some(Key::End),
        "PageUp" => Some(Key::PageUp),
        "PageDown" => Some(Key::PageDown),
        "ArrowUp" | "Up" => Some(Key::Up),
        "ArrowDown" | "Down" => Some(Key::Down),
        "ArrowLeft" | "Left" => Some(Key::Left),
        "ArrowRight" | "Right" => Some(Key::Right),
        "Spacebar" => Some(Key::Char(' ')),
        _ => parse_function_key(identifier).map(Key::F),
    }
}

fn parse_function_key(s: &str) -> Option<u8> {
    let rest = s.strip_prefix('F')?;
    rest.parse::<u8>().ok().filter(|n| (1..=12).contains(n))
}

/// Fixed canonical sequences for navigation/editing/function keys,
/// applicable under no or shift-only modifiers.
#[must_use]
pub fn canonical_sequence(key: Key) -> Option<&'static [u8]> {
    Some(match key {
        Key::Enter => b"\r",
        Key::Tab => b"\t",
        Key::Escape => b"\x1b",
        Key::Backspace => b"\x7f",
        Key::Up => b"\x1b[A",
        Key::Down => b"\x1b[B",
        Key::Right => b"\x1b[C",
        Key::Left => b"\x1b[D",
        Key::Home => b"\x1b[H",
        Key::End => b"\x1b[F",
        Key::Insert => b"\x1b[2~",
        Key::Delete => b"\x1b[3~",
        Key::PageUp => b"\x1b[5~",
        Key::PageDown => b"\x1b[6~",
        Key::F(1) => b"\x1bOP",
        Key::F(2) => b"\x1bOQ",
        Key::F(3) => b"\x1bOR",
        Key::F(4) => b"\x1bOS",
        Key::F(5) => b"\x1b[15~",
        Key::F(6) => b"\x1b[17~",
        Key::F(7) => b"\x1b[18~",
        Key::F(8) => b"\x1b[19~",
        Key::F(9) => b"\x1b[20~",
        Key::F(10) => b"\x1b[21~",
        Key::F(11) => b"\x1b[23~",
        Key::F(12) => b"\x1b[24~",
        _ => return None,
    })
}

/// Stock [`AdvancedEncoder`] speaking the legacy xterm protocol: alt as an
/// ESC prefix, ctrl+letter as control characters, CSI `1;<mod>` parameter
/// forms for navigation keys. Hosts with richer protocol needs substitute
/// their own implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VtKeyEncoder;

impl AdvancedEncoder for VtKeyEncoder {
    fn encode(&mut self, request: &EncodeRequest) -> Result<Vec<u8>, EncodeError> {
        // Legacy terminal streams have no key-up representation.
        if request.action == KeyAction::Release {
            return Ok(Vec::new());
        }

        let mods = request.mods;
        Ok(match request.key {
            Key::Char(ch) => encode_char(request.literal_hint.unwrap_or(ch), mods),
            Key::Enter => alt_prefixed(mods, b"\r"),
            Key::Escape => alt_prefixed(mods, b"\x1b"),
            Key::Backspace => alt_prefixed(mods, b"\x7f"),
            Key::Tab => alt_prefixed(mods, b"\t"),
            Key::Up => csi_modified('A', mods),
            Key::Down => csi_modified('B', mods),
            Key::Right => csi_modified('C', mods),
            Key::Left => csi_modified('D', mods),
            Key::Home => csi_modified('H', mods),
            Key::End => csi_modified('F', mods),
            Key::Insert => csi_tilde(2, mods),
            Key::Delete => csi_tilde(3, mods),
            Key::PageUp => csi_tilde(5, mods),
            Key::PageDown => csi_tilde(6, mods),
            Key::F(n) => return function_key(n, mods),
        })
    }
}

fn encode_char(ch: char, mods: Modifiers) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    if mods.contains(Modifiers::ALT) {
        out.push(0x1b);
    }

    if mods.contains(Modifiers::CTRL)
        && let Some(ctrl) = ctrl_char_to_byte(ch)
    {
        out.push(ctrl);
        return out;
    }

    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    out
}

fn ctrl_char_to_byte(ch: char) -> Option<u8> {
    match ch {
        '@' | ' ' => Some(0x00),
        'a'..='z' => Some((u32::from(ch) as u8) - b'a' + 1),
        'A'..='Z' => Some((u32::from(ch) as u8) - b'A' + 1),
        '[' => Some(0x1b),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' => Some(0x1e),
        '_' => Some(0x1f),
        _ => None,
    }
}

fn alt_prefixed(mods: Modifiers, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    if mods.contains(Modifiers::ALT) {
        out.push(0x1b);
    }
    out.extend_from_slice(bytes);
    out
}

fn csi_modified(final_byte: char, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{final_byte}").into_bytes()
    } else {
        let mod_value = xterm_modifier_value(mods);
        format!("\x1b[1;{mod_value}{final_byte}").into_bytes()
    }
}

fn csi_tilde(code: u16, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{code}~").into_bytes()
    } else {
        let mod_value = xterm_modifier_value(mods);
        format!("\x1b[{code};{mod_value}~").into_bytes()
    }
}

fn function_key(n: u8, mods: Modifiers) -> Result<Vec<u8>, EncodeError> {
    Ok(match n {
        1..=4 => {
            // The SS3 family has no modifier parameter slot.
            if !mods.is_empty() {
                return Ok(Vec::new());
            }
            let ss3 = match n {
                1 => b'P',
                2 => b'Q',
                3 => b'R',
                _ => b'S',
            };
            vec![0x1b, b'O', ss3]
        }
        5 => csi_tilde(15, mods),
        6 => csi_tilde(17, mods),
        7 => csi_tilde(18, mods),
        8 => csi_tilde(19, mods),
        9 => csi_tilde(20, mods),
        10 => csi_tilde(21, mods),
        11 => csi_tilde(23, mods),
        12 => csi_tilde(24, mods),
        _ => return Err(EncodeError::Unsupported),
    })
}

fn xterm_modifier_value(mods: Modifiers) -> u8 {
    // xterm encoding is `1 + bits`, with bits matching our bitflag layout.
    1 + mods.bits()
}

/// Single printable character carried by the event, if any.
fn printable_char(event: &KeyEvent) -> Option<char> {
    let mut chars = event.key.chars();
    let ch = chars.next()?;
    if chars.next().is_none() && !ch.is_control() {
        Some(ch)
    } else {
        None
    }
}

fn is_paste_chord(event: &KeyEvent) -> bool {
    event.key.eq_ignore_ascii_case("v")
        && event.mods.intersects(Modifiers::CTRL | Modifiers::SUPER)
}

/// Super+C only: ctrl+C is a control character, not a copy chord.
fn is_copy_chord(event: &KeyEvent) -> bool {
    event.key.eq_ignore_ascii_case("c") && event.mods.contains(Modifiers::SUPER)
}

/// Lower-cased base character for single printable ASCII keys.
fn literal_hint(key: Key) -> Option<char> {
    match key {
        Key::Char(ch) if ch.is_ascii() && !ch.is_ascii_control() => {
            Some(ch.to_ascii_lowercase())
        }
        _ => None,
    }
}

/// Classifies physical key and clipboard events and emits protocol bytes
/// through the output callback.
pub struct InputEncoder<E: AdvancedEncoder> {
    advanced: E,
    on_output: Box<dyn FnMut(&[u8])>,
    on_bell: Box<dyn FnMut()>,
    on_raw_key: Option<Box<dyn FnMut(&KeyEvent)>>,
    custom_handler: Option<Box<dyn FnMut(&KeyEvent) -> bool>>,
    active: bool,
}

impl<E: AdvancedEncoder> InputEncoder<E> {
    pub fn new(
        advanced: E,
        on_output: impl FnMut(&[u8]) + 'static,
        on_bell: impl FnMut() + 'static,
    ) -> Self {
        Self {
            advanced,
            on_output: Box::new(on_output),
            on_bell: Box::new(on_bell),
            on_raw_key: None,
            custom_handler: None,
            active: true,
        }
    }

    /// Register an observer that sees every physical key press before any
    /// classification.
    #[must_use]
    pub fn with_raw_key_observer(mut self, observer: impl FnMut(&KeyEvent) + 'static) -> Self {
        self.on_raw_key = Some(Box::new(observer));
        self
    }

    /// Replace (or clear) the custom override at runtime. A handler that
    /// returns true claims the event: default is suppressed and no encoding
    /// occurs.
    pub fn set_custom_key_handler(
        &mut self,
        handler: Option<Box<dyn FnMut(&KeyEvent) -> bool>>,
    ) {
        self.custom_handler = handler;
    }

    /// Classify one keydown. First match wins; the returned disposition
    /// tells the host what to do with the browser event.
    pub fn handle_keydown(&mut self, event: &KeyEvent) -> KeyDisposition {
        if !self.active {
            return KeyDisposition::Passthrough;
        }

        // Observers see every physical key, before any classification.
        if let Some(observer) = &mut self.on_raw_key {
            observer(event);
        }

        if let Some(handler) = &mut self.custom_handler
            && handler(event)
        {
            return KeyDisposition::SuppressAndStop;
        }

        // Clipboard chords ride the browser defaults: the native paste
        // event and the selection layer do the actual work.
        if is_paste_chord(event) || is_copy_chord(event) {
            return KeyDisposition::Passthrough;
        }

        // Printable fast path. Shift alone already produced the correct
        // cased or symbol character.
        if let Some(ch) = printable_char(event)
            && !event
                .mods
                .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::SUPER)
        {
            let mut buf = [0u8; 4];
            self.emit(ch.encode_utf8(&mut buf).as_bytes());
            return KeyDisposition::Suppress;
        }

        // Unmapped keys keep their browser behavior untouched.
        let Some(key) = lookup_key(&event.key) else {
            return KeyDisposition::Passthrough;
        };

        if event.mods.difference(Modifiers::SHIFT).is_empty()
            && let Some(sequence) = canonical_sequence(key)
        {
            self.emit(sequence);
            return KeyDisposition::Suppress;
        }

        let request = EncodeRequest {
            action: KeyAction::Press,
            key,
            mods: event.mods,
            literal_hint: literal_hint(key),
        };
        match self.advanced.encode(&request) {
            Ok(bytes) if !bytes.is_empty() => self.emit(&bytes),
            Ok(_) => {}
            Err(err) => {
                // An encoder failure must never take down the input path.
                #[cfg(feature = "tracing")]
                warn!(key = %event.key, error = %err, "advanced key encoding failed");
                let _ = err; // Suppress unused warning when tracing is disabled
            }
        }
        KeyDisposition::SuppressAndStop
    }

    /// Clipboard paste. The host always suppresses the default action; a
    /// missing or empty payload is a no-op, anything else is emitted
    /// verbatim as one chunk with no bracketed-paste wrapping.
    pub fn handle_paste(&mut self, payload: Option<&str>) {
        if !self.active {
            return;
        }
        if let Some(text) = payload
            && !text.is_empty()
        {
            self.emit(text.as_bytes());
        }
    }

    /// Forward a bell notification to the host callback.
    pub fn ring_bell(&mut self) {
        if self.active {
            (self.on_bell)();
        }
    }

    /// Detach from the event stream. Idempotent; events arriving after
    /// disposal produce no callback invocations.
    pub fn dispose(&mut self) {
        self.active = false;
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    fn emit(&mut self, bytes: &[u8]) {
        (self.on_output)(bytes);
    }
}
