// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Turns raw bytes from the terminal into structured events. Recognized
// encodings:
//
// - Legacy CSI sequences (arrows, Home/End, editing and function keys),
//   including xterm modifier parameters (`CSI 1;5A` is Ctrl+Up)
// - SS3 sequences (arrows and F1–F4 in application mode)
// - Linux console function keys (`CSI [ A` … `CSI [ E`)
// - Back-Tab (`CSI Z`)
// - SGR mouse (`CSI < b;x;y M/m`) and X10 mouse (`CSI M b x y`)
// - UTF-8 multi-byte characters, reassembled across reads
//
// # Design
//
// The decoder keeps a small byte buffer because sequences span reads.
// Bytes go in with [`Decoder::feed`]; events come out one at a time from
// [`Decoder::next_event`], which only parses as far as it has to.
//
// An ESC that does not start a recognizable sequence (unknown final byte,
// a byte that cannot appear inside a sequence, or more than 32 bytes
// without a terminator) is resolved on its own and every byte after it is
// parsed again from scratch, so no input is lost. In `Esc` mode it becomes
// an Escape key; in `Alt` mode it sets ALT on the next key instead.
//
// A lone ESC is ambiguous until more bytes arrive. The session waits for
// the escape delay and then calls [`Decoder::flush`], which resolves every
// pending prefix as if it could not match.

use serde::Serialize;

use crate::keys::{EscapeMode, EventType, InputMode, Key, Mod};

// ─── Event Types ─────────────────────────────────────────────────────────────

/// A decoded input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    /// The terminal changed size.
    Resize { width: u16, height: u16 },
    Mouse(MouseEvent),
}

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub modifiers: Mod,
    pub code: KeyCode,
}

/// Either a character or a key from the frozen table. Space, the control
/// bytes and DEL are keys, never characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Key(Key),
}

/// A mouse button, release or wheel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub modifiers: Mod,
    /// One of the `Key::MOUSE_*` codes.
    pub key: Key,
    /// 0-based column.
    pub x: u16,
    /// 0-based row.
    pub y: u16,
}

impl Event {
    #[must_use]
    pub const fn key(code: Key) -> Self {
        Self::Key(KeyEvent {
            modifiers: Mod::empty(),
            code: KeyCode::Key(code),
        })
    }

    #[must_use]
    pub const fn char(ch: char) -> Self {
        Self::Key(KeyEvent {
            modifiers: Mod::empty(),
            code: KeyCode::Char(ch),
        })
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Key(_) => EventType::Key,
            Self::Resize { .. } => EventType::Resize,
            Self::Mouse(_) => EventType::Mouse,
        }
    }

    /// Add modifiers to a key event. Other events are returned unchanged.
    #[must_use]
    pub fn with_modifiers(self, extra: Mod) -> Self {
        match self {
            Self::Key(k) => Self::Key(KeyEvent {
                modifiers: k.modifiers | extra,
                ..k
            }),
            other => other,
        }
    }
}

// ─── EventRecord ─────────────────────────────────────────────────────────────

/// Flat form of an event, every field present and zero when irrelevant.
///
/// This is the shape hosts log or hand across language boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub modifiers: u8,
    pub key: u16,
    pub rune: u32,
    pub width: u16,
    pub height: u16,
    pub x: u16,
    pub y: u16,
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        let blank = Self {
            kind: event.event_type(),
            modifiers: 0,
            key: 0,
            rune: 0,
            width: 0,
            height: 0,
            x: 0,
            y: 0,
        };
        match event {
            Event::Key(KeyEvent { modifiers, code }) => {
                let (key, rune) = match code {
                    KeyCode::Char(ch) => (0, ch as u32),
                    KeyCode::Key(k) => (k.code(), 0),
                };
                Self {
                    modifiers: modifiers.bits(),
                    key,
                    rune,
                    ..blank
                }
            }
            Event::Resize { width, height } => Self {
                width,
                height,
                ..blank
            },
            Event::Mouse(m) => Self {
                modifiers: m.modifiers.bits(),
                key: m.key.code(),
                x: m.x,
                y: m.y,
                ..blank
            },
        }
    }
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Longest escape sequence we wait for before giving up on it.
pub const MAX_SEQUENCE: usize = 32;

/// Incremental byte-to-event decoder.
#[derive(Debug)]
pub struct Decoder {
    buf: Vec<u8>,
    mode: InputMode,
    /// An unmatched ESC in Alt mode is waiting for the key it modifies.
    pending_alt: bool,
    /// Resolve incomplete prefixes instead of waiting for more bytes.
    forcing: bool,
}

impl Decoder {
    #[must_use]
    pub fn new(mode: InputMode) -> Self {
        Self {
            buf: Vec::with_capacity(64),
            mode,
            pending_alt: false,
            forcing: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switch policy. Takes effect for bytes not yet decoded.
    pub const fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
        if matches!(mode.escape, EscapeMode::Esc) {
            self.pending_alt = false;
        }
    }

    /// Append raw bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Are there buffered bytes that have not formed an event yet?
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Decode the next complete event, if the buffer holds one.
    pub fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.buf.is_empty() {
                self.forcing = false;
                return None;
            }

            let parsed = match try_parse(&self.buf) {
                Parsed::Incomplete if self.buf[0] == 0x1B => {
                    if self.forcing || self.buf.len() >= MAX_SEQUENCE {
                        Parsed::Invalid
                    } else {
                        Parsed::Incomplete
                    }
                }
                Parsed::Incomplete if self.forcing => Parsed::Skip(1),
                parsed => parsed,
            };

            match parsed {
                Parsed::Event(event, consumed) => {
                    self.buf.drain(..consumed);
                    if let Some(event) = self.finish(event) {
                        return Some(event);
                    }
                }
                Parsed::Incomplete => return None,
                Parsed::Invalid => {
                    tracing::debug!(
                        bytes = ?&self.buf[..self.buf.len().min(MAX_SEQUENCE)],
                        "unmatched escape sequence"
                    );
                    self.buf.drain(..1);
                    match self.mode.escape {
                        EscapeMode::Esc => return Some(Event::key(Key::ESC)),
                        EscapeMode::Alt => self.pending_alt = true,
                    }
                }
                Parsed::Skip(n) => {
                    self.buf.drain(..n);
                }
            }
        }
    }

    /// Stop waiting for more bytes: resolve every pending prefix now and
    /// return the first resulting event.
    pub fn flush(&mut self) -> Option<Event> {
        self.forcing = true;
        self.next_event()
    }

    /// Apply the mode to a freshly parsed event.
    fn finish(&mut self, event: Event) -> Option<Event> {
        match event {
            Event::Mouse(_) if !self.mode.mouse => None,
            Event::Key(_) if self.pending_alt => {
                self.pending_alt = false;
                Some(event.with_modifiers(Mod::ALT))
            }
            other => Some(other),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(InputMode::default())
    }
}

// ─── Stateless Parsing Functions ─────────────────────────────────────────────
//
// Every parse function reads from the start of `buf` and reports what it
// found plus how many bytes that consumed. No mutable state.

enum Parsed {
    /// An event, consuming `usize` bytes.
    Event(Event, usize),
    /// Could still match; need more bytes.
    Incomplete,
    /// An ESC-led sequence that can never match.
    Invalid,
    /// Bytes that carry no event (malformed UTF-8, unsupported wheel
    /// directions).
    Skip(usize),
}

fn try_parse(buf: &[u8]) -> Parsed {
    match buf[0] {
        0x1B => parse_escape(buf),
        0x00 => Parsed::Event(ctrl(Key::CTRL_TILDE), 1),
        0x08 => Parsed::Event(Event::key(Key::BACKSPACE), 1),
        0x09 => Parsed::Event(Event::key(Key::TAB), 1),
        0x0D => Parsed::Event(Event::key(Key::ENTER), 1),
        b @ (0x01..=0x1A | 0x1C..=0x1F) => match Key::from_control_byte(b) {
            Some(key) => Parsed::Event(ctrl(key), 1),
            None => Parsed::Skip(1),
        },
        0x20 => Parsed::Event(Event::key(Key::SPACE), 1),
        0x7F => Parsed::Event(Event::key(Key::BACKSPACE2), 1),
        b @ 0x21..=0x7E => Parsed::Event(Event::char(b as char), 1),
        0xC0..=0xFF => parse_utf8(buf),
        // Stray continuation byte.
        _ => Parsed::Skip(1),
    }
}

// ── Escape sequences ─────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8]) -> Parsed {
    debug_assert_eq!(buf[0], 0x1B);

    match buf.get(1) {
        None => Parsed::Incomplete,
        Some(b'[') => parse_csi(buf),
        Some(b'O') => parse_ss3(buf),
        Some(_) => Parsed::Invalid,
    }
}

// ── CSI (Control Sequence Introducer) ────────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[1] == b'[');

    let Some(&third) = buf.get(2) else {
        return Parsed::Incomplete;
    };

    match third {
        b'<' => return parse_sgr_mouse(buf),
        b'M' => return parse_x10_mouse(buf),
        b'[' => return parse_linux_function(buf),
        _ => {}
    }

    // Scan for the final byte (0x40..=0x7E). Parameter bytes are
    // 0x30..=0x3F, intermediates 0x20..=0x2F.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            return Parsed::Invalid;
        }
        end += 1;
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params = parse_csi_params(&buf[2..end]);
    let consumed = end + 1;
    let modifiers = params.get(1).map_or(Mod::empty(), |&p| decode_modifiers(p));

    // ── Tilde-terminated sequences (editing keys, function keys) ──────
    if final_byte == b'~' {
        let key = match params.first().copied().unwrap_or(0) {
            1 | 7 => Key::HOME,
            2 => Key::INSERT,
            3 => Key::DELETE,
            4 | 8 => Key::END,
            5 => Key::PGUP,
            6 => Key::PGDN,
            11 => Key::F1,
            12 => Key::F2,
            13 => Key::F3,
            14 => Key::F4,
            15 => Key::F5,
            17 => Key::F6,
            18 => Key::F7,
            19 => Key::F8,
            20 => Key::F9,
            21 => Key::F10,
            23 => Key::F11,
            24 => Key::F12,
            _ => return Parsed::Invalid,
        };
        return Parsed::Event(key_with(key, modifiers), consumed);
    }

    // ── Letter-terminated sequences ───────────────────────────────────
    let key = match final_byte {
        b'A' => Key::ARROW_UP,
        b'B' => Key::ARROW_DOWN,
        b'C' => Key::ARROW_RIGHT,
        b'D' => Key::ARROW_LEFT,
        b'H' => Key::HOME,
        b'F' => Key::END,
        b'P' => Key::F1,
        b'Q' => Key::F2,
        b'R' => Key::F3,
        b'S' => Key::F4,
        b'Z' => Key::BACK_TAB,
        _ => return Parsed::Invalid,
    };
    Parsed::Event(key_with(key, modifiers), consumed)
}

/// Linux console F1–F5: `ESC [ [ A` … `ESC [ [ E`.
fn parse_linux_function(buf: &[u8]) -> Parsed {
    match buf.get(3) {
        None => Parsed::Incomplete,
        Some(&b @ b'A'..=b'E') => match Key::function(b - b'A' + 1) {
            Some(key) => Parsed::Event(Event::key(key), 4),
            None => Parsed::Invalid,
        },
        Some(_) => Parsed::Invalid,
    }
}

// ── SS3 (Single Shift 3) ─────────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[1] == b'O');

    let Some(&b) = buf.get(2) else {
        return Parsed::Incomplete;
    };
    let key = match b {
        b'A' => Key::ARROW_UP,
        b'B' => Key::ARROW_DOWN,
        b'C' => Key::ARROW_RIGHT,
        b'D' => Key::ARROW_LEFT,
        b'H' => Key::HOME,
        b'F' => Key::END,
        b'P' => Key::F1,
        b'Q' => Key::F2,
        b'R' => Key::F3,
        b'S' => Key::F4,
        _ => return Parsed::Invalid,
    };
    Parsed::Event(Event::key(key), 3)
}

// ── Mouse ────────────────────────────────────────────────────────────────────

/// `ESC [ < Pb ; Px ; Py M` (press / motion) or `… m` (release).
fn parse_sgr_mouse(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 3 && buf[2] == b'<');

    let start = 3;
    let mut end = start;
    while end < buf.len() {
        match buf[end] {
            b'M' | b'm' => break,
            b if b.is_ascii_digit() || b == b';' => end += 1,
            _ => return Parsed::Invalid,
        }
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let params = parse_csi_params(&buf[start..end]);
    let &[cb, raw_x, raw_y] = params.as_slice() else {
        return Parsed::Invalid;
    };
    let release = buf[end] == b'm';
    let consumed = end + 1;

    // SGR coordinates are 1-based.
    mouse_event(cb, release, raw_x.saturating_sub(1), raw_y.saturating_sub(1))
        .map_or(Parsed::Skip(consumed), |event| Parsed::Event(event, consumed))
}

/// `ESC [ M Cb Cx Cy`, each value offset by 32 and coordinates 1-based.
fn parse_x10_mouse(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 3 && buf[2] == b'M');

    let Some(&[cb, cx, cy]) = buf.get(3..6) else {
        return Parsed::Incomplete;
    };
    let cb = u16::from(cb.saturating_sub(32));
    let x = u16::from(cx.saturating_sub(33));
    let y = u16::from(cy.saturating_sub(33));
    mouse_event(cb, false, x, y).map_or(Parsed::Skip(6), |event| Parsed::Event(event, 6))
}

/// Decode the button byte shared by both mouse encodings. `None` for
/// wheel directions without a key code (horizontal scrolling).
fn mouse_event(cb: u16, release: bool, x: u16, y: u16) -> Option<Event> {
    let base = cb & 3;
    let key = if cb & 64 != 0 {
        match base {
            0 => Key::MOUSE_WHEEL_UP,
            1 => Key::MOUSE_WHEEL_DOWN,
            _ => return None,
        }
    } else if release {
        Key::MOUSE_RELEASE
    } else {
        match base {
            0 => Key::MOUSE_LEFT,
            1 => Key::MOUSE_MIDDLE,
            2 => Key::MOUSE_RIGHT,
            _ => Key::MOUSE_RELEASE,
        }
    };

    let mut modifiers = Mod::empty();
    if cb & 4 != 0 {
        modifiers |= Mod::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Mod::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Mod::CTRL;
    }
    if cb & 32 != 0 {
        modifiers |= Mod::MOTION;
    }

    Some(Event::Mouse(MouseEvent { modifiers, key, x, y }))
}

// ── UTF-8 ────────────────────────────────────────────────────────────────────

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = utf8_char_len(buf[0]);

    if expected == 0 {
        return Parsed::Skip(1);
    }
    // Check what we have so far before waiting for the rest.
    let have = buf.len().min(expected);
    if buf[1..have].iter().any(|&b| b & 0xC0 != 0x80) {
        return Parsed::Skip(1);
    }
    if buf.len() < expected {
        return Parsed::Incomplete;
    }

    std::str::from_utf8(&buf[..expected])
        .ok()
        .and_then(|s| s.chars().next())
        .map_or(Parsed::Skip(1), |ch| Parsed::Event(Event::char(ch), expected))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

const fn ctrl(key: Key) -> Event {
    key_with(key, Mod::CTRL)
}

const fn key_with(key: Key, modifiers: Mod) -> Event {
    Event::Key(KeyEvent {
        modifiers,
        code: KeyCode::Key(key),
    })
}

/// Semicolon-separated numeric parameters. Empty fields are 0.
fn parse_csi_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            field
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .fold(0u16, |acc, &b| acc.saturating_mul(10).saturating_add(u16::from(b - b'0')))
        })
        .collect()
}

/// xterm modifier parameter: `1 + bitmask` with shift = 1, alt = 2,
/// ctrl = 4, meta = 8. Meta is reported as ALT.
const fn decode_modifiers(param: u16) -> Mod {
    let bits = param.saturating_sub(1);
    let mut m = Mod::empty();
    if bits & 1 != 0 {
        m = m.union(Mod::SHIFT);
    }
    if bits & (2 | 8) != 0 {
        m = m.union(Mod::ALT);
    }
    if bits & 4 != 0 {
        m = m.union(Mod::CTRL);
    }
    m
}

/// Byte length of a UTF-8 character from its lead byte; 0 if invalid.
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode_with(mode: InputMode, data: &[u8]) -> Vec<Event> {
        let mut d = Decoder::new(mode);
        d.feed(data);
        std::iter::from_fn(|| d.next_event()).collect()
    }

    fn decode(data: &[u8]) -> Vec<Event> {
        decode_with(InputMode::default(), data)
    }

    fn decode_one(data: &[u8]) -> Event {
        let events = decode(data);
        assert_eq!(events.len(), 1, "expected one event from {data:?}, got {events:?}");
        events[0]
    }

    fn mouse_mode() -> InputMode {
        InputMode::new(EscapeMode::Esc, true)
    }

    fn key_mod(key: Key, modifiers: Mod) -> Event {
        key_with(key, modifiers)
    }

    fn mouse(key: Key, modifiers: Mod, x: u16, y: u16) -> Event {
        Event::Mouse(MouseEvent { modifiers, key, x, y })
    }

    // ── ASCII ───────────────────────────────────────────────────────────

    #[test]
    fn printable_ascii() {
        assert_eq!(decode(b"ab~"), vec![Event::char('a'), Event::char('b'), Event::char('~')]);
    }

    #[test]
    fn space_is_a_key() {
        assert_eq!(decode_one(b" "), Event::key(Key::SPACE));
    }

    // ── Control bytes ───────────────────────────────────────────────────

    #[test]
    fn ctrl_letters_carry_ctrl() {
        assert_eq!(decode_one(b"\x01"), key_mod(Key::CTRL_A, Mod::CTRL));
        assert_eq!(decode_one(b"\x11"), key_mod(Key::CTRL_Q, Mod::CTRL));
        assert_eq!(decode_one(b"\x1a"), key_mod(Key::CTRL_Z, Mod::CTRL));
    }

    #[test]
    fn nul_is_ctrl_tilde() {
        assert_eq!(decode_one(b"\x00"), key_mod(Key::CTRL_TILDE, Mod::CTRL));
    }

    #[test]
    fn enter_tab_backspace_are_plain() {
        assert_eq!(decode_one(b"\r"), Event::key(Key::ENTER));
        assert_eq!(decode_one(b"\t"), Event::key(Key::TAB));
        assert_eq!(decode_one(b"\x08"), Event::key(Key::BACKSPACE));
        assert_eq!(decode_one(b"\x7f"), Event::key(Key::BACKSPACE2));
    }

    #[test]
    fn high_control_bytes() {
        assert_eq!(decode_one(b"\x1c"), key_mod(Key::CTRL_BACKSLASH, Mod::CTRL));
        assert_eq!(decode_one(b"\x1f"), key_mod(Key::CTRL_UNDERSCORE, Mod::CTRL));
    }

    // ── CSI keys ────────────────────────────────────────────────────────

    #[test]
    fn arrows() {
        assert_eq!(decode_one(b"\x1b[A"), Event::key(Key::ARROW_UP));
        assert_eq!(decode_one(b"\x1b[B"), Event::key(Key::ARROW_DOWN));
        assert_eq!(decode_one(b"\x1b[C"), Event::key(Key::ARROW_RIGHT));
        assert_eq!(decode_one(b"\x1b[D"), Event::key(Key::ARROW_LEFT));
    }

    #[test]
    fn arrow_leaves_nothing_buffered() {
        let mut d = Decoder::default();
        d.feed(b"\x1b[A");
        assert_eq!(d.next_event(), Some(Event::key(Key::ARROW_UP)));
        assert!(!d.has_pending());
        assert_eq!(d.next_event(), None);
    }

    #[test]
    fn xterm_modifiers() {
        assert_eq!(decode_one(b"\x1b[1;5A"), key_mod(Key::ARROW_UP, Mod::CTRL));
        assert_eq!(decode_one(b"\x1b[1;2D"), key_mod(Key::ARROW_LEFT, Mod::SHIFT));
        assert_eq!(decode_one(b"\x1b[1;3B"), key_mod(Key::ARROW_DOWN, Mod::ALT));
        assert_eq!(
            decode_one(b"\x1b[1;6C"),
            key_mod(Key::ARROW_RIGHT, Mod::CTRL | Mod::SHIFT)
        );
        assert_eq!(decode_one(b"\x1b[1;9H"), key_mod(Key::HOME, Mod::ALT));
    }

    #[test]
    fn navigation_keys() {
        assert_eq!(decode_one(b"\x1b[H"), Event::key(Key::HOME));
        assert_eq!(decode_one(b"\x1b[F"), Event::key(Key::END));
        assert_eq!(decode_one(b"\x1b[1~"), Event::key(Key::HOME));
        assert_eq!(decode_one(b"\x1b[7~"), Event::key(Key::HOME));
        assert_eq!(decode_one(b"\x1b[2~"), Event::key(Key::INSERT));
        assert_eq!(decode_one(b"\x1b[3~"), Event::key(Key::DELETE));
        assert_eq!(decode_one(b"\x1b[4~"), Event::key(Key::END));
        assert_eq!(decode_one(b"\x1b[8~"), Event::key(Key::END));
        assert_eq!(decode_one(b"\x1b[5~"), Event::key(Key::PGUP));
        assert_eq!(decode_one(b"\x1b[6~"), Event::key(Key::PGDN));
        assert_eq!(decode_one(b"\x1b[3;5~"), key_mod(Key::DELETE, Mod::CTRL));
    }

    #[test]
    fn function_keys() {
        assert_eq!(decode_one(b"\x1bOP"), Event::key(Key::F1));
        assert_eq!(decode_one(b"\x1bOS"), Event::key(Key::F4));
        assert_eq!(decode_one(b"\x1b[11~"), Event::key(Key::F1));
        assert_eq!(decode_one(b"\x1b[15~"), Event::key(Key::F5));
        assert_eq!(decode_one(b"\x1b[17~"), Event::key(Key::F6));
        assert_eq!(decode_one(b"\x1b[21~"), Event::key(Key::F10));
        assert_eq!(decode_one(b"\x1b[23~"), Event::key(Key::F11));
        assert_eq!(decode_one(b"\x1b[24~"), Event::key(Key::F12));
        assert_eq!(decode_one(b"\x1b[24;5~"), key_mod(Key::F12, Mod::CTRL));
    }

    #[test]
    fn linux_console_function_keys() {
        assert_eq!(decode_one(b"\x1b[[A"), Event::key(Key::F1));
        assert_eq!(decode_one(b"\x1b[[E"), Event::key(Key::F5));
    }

    #[test]
    fn ss3_navigation() {
        assert_eq!(decode_one(b"\x1bOA"), Event::key(Key::ARROW_UP));
        assert_eq!(decode_one(b"\x1bOH"), Event::key(Key::HOME));
        assert_eq!(decode_one(b"\x1bOF"), Event::key(Key::END));
    }

    #[test]
    fn back_tab() {
        assert_eq!(decode_one(b"\x1b[Z"), Event::key(Key::BACK_TAB));
    }

    // ── Invalid sequences ───────────────────────────────────────────────

    #[test]
    fn unknown_final_byte_becomes_escape_and_reprocesses() {
        assert_eq!(
            decode(b"\x1b[y"),
            vec![Event::key(Key::ESC), Event::char('['), Event::char('y')]
        );
    }

    #[test]
    fn unknown_tilde_number_becomes_escape() {
        assert_eq!(
            decode(b"\x1b[99~"),
            vec![
                Event::key(Key::ESC),
                Event::char('['),
                Event::char('9'),
                Event::char('9'),
                Event::char('~'),
            ]
        );
    }

    #[test]
    fn escape_then_letter_in_esc_mode() {
        assert_eq!(decode(b"\x1ba"), vec![Event::key(Key::ESC), Event::char('a')]);
    }

    #[test]
    fn escape_then_letter_in_alt_mode() {
        let alt = InputMode::new(EscapeMode::Alt, false);
        assert_eq!(
            decode_with(alt, b"\x1ba"),
            vec![Event::Key(KeyEvent {
                modifiers: Mod::ALT,
                code: KeyCode::Char('a'),
            })]
        );
    }

    #[test]
    fn alt_applies_only_to_next_key() {
        let alt = InputMode::new(EscapeMode::Alt, false);
        let events = decode_with(alt, b"\x1bab");
        assert_eq!(events[1], Event::char('b'));
    }

    #[test]
    fn overlong_sequence_is_abandoned() {
        let mut data = b"\x1b[".to_vec();
        data.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE));
        let events = decode(&data);
        assert_eq!(events[0], Event::key(Key::ESC));
        assert_eq!(events[1], Event::char('['));
        assert_eq!(events.len(), 2 + MAX_SEQUENCE);
    }

    #[test]
    fn control_byte_inside_csi_is_invalid() {
        assert_eq!(
            decode(b"\x1b[\x01"),
            vec![
                Event::key(Key::ESC),
                Event::char('['),
                key_mod(Key::CTRL_A, Mod::CTRL),
            ]
        );
    }

    // ── Incremental feeding ─────────────────────────────────────────────

    #[test]
    fn byte_at_a_time_arrow() {
        let mut d = Decoder::default();
        d.feed(b"\x1b");
        assert_eq!(d.next_event(), None);
        d.feed(b"[");
        assert_eq!(d.next_event(), None);
        d.feed(b"A");
        assert_eq!(d.next_event(), Some(Event::key(Key::ARROW_UP)));
        assert_eq!(d.next_event(), None);
    }

    #[test]
    fn lone_escape_waits_then_flushes() {
        let mut d = Decoder::default();
        d.feed(b"\x1b");
        assert_eq!(d.next_event(), None);
        assert!(d.has_pending());
        assert_eq!(d.flush(), Some(Event::key(Key::ESC)));
        assert!(!d.has_pending());
    }

    #[test]
    fn flush_partial_csi_reprocesses_tail() {
        let mut d = Decoder::default();
        d.feed(b"\x1b[1;");
        assert_eq!(d.next_event(), None);
        assert_eq!(d.flush(), Some(Event::key(Key::ESC)));
        assert_eq!(d.next_event(), Some(Event::char('[')));
        assert_eq!(d.next_event(), Some(Event::char('1')));
        assert_eq!(d.next_event(), Some(Event::char(';')));
        assert_eq!(d.next_event(), None);
    }

    #[test]
    fn flush_in_alt_mode_waits_for_next_key() {
        let mut d = Decoder::new(InputMode::new(EscapeMode::Alt, false));
        d.feed(b"\x1b");
        assert_eq!(d.flush(), None);
        d.feed(b"x");
        assert_eq!(
            d.next_event(),
            Some(Event::Key(KeyEvent {
                modifiers: Mod::ALT,
                code: KeyCode::Char('x'),
            }))
        );
    }

    #[test]
    fn forcing_ends_once_buffer_drains() {
        let mut d = Decoder::default();
        d.feed(b"\x1b");
        assert_eq!(d.flush(), Some(Event::key(Key::ESC)));
        assert_eq!(d.next_event(), None);
        d.feed(b"\x1b[");
        assert_eq!(d.next_event(), None);
        d.feed(b"B");
        assert_eq!(d.next_event(), Some(Event::key(Key::ARROW_DOWN)));
    }

    // ── UTF-8 ───────────────────────────────────────────────────────────

    #[test]
    fn utf8_multibyte() {
        assert_eq!(decode_one("é".as_bytes()), Event::char('é'));
        assert_eq!(decode_one("中".as_bytes()), Event::char('中'));
        assert_eq!(decode_one("🦀".as_bytes()), Event::char('🦀'));
    }

    #[test]
    fn utf8_split_across_feeds() {
        let bytes = "中".as_bytes();
        let mut d = Decoder::default();
        d.feed(&bytes[..1]);
        assert_eq!(d.next_event(), None);
        d.feed(&bytes[1..2]);
        assert_eq!(d.next_event(), None);
        d.feed(&bytes[2..]);
        assert_eq!(d.next_event(), Some(Event::char('中')));
    }

    #[test]
    fn malformed_utf8_is_dropped_bytewise() {
        assert_eq!(decode(b"\xe4x"), vec![Event::char('x')]);
        assert_eq!(decode(b"\x80\xbfy"), vec![Event::char('y')]);
    }

    #[test]
    fn truncated_utf8_dropped_on_flush() {
        let mut d = Decoder::default();
        d.feed(&"中".as_bytes()[..2]);
        assert_eq!(d.flush(), None);
        assert!(!d.has_pending());
    }

    // ── Mouse ───────────────────────────────────────────────────────────

    #[test]
    fn mouse_dropped_without_mouse_mode() {
        assert_eq!(decode(b"\x1b[<0;10;5M"), vec![]);
        assert_eq!(decode(b"\x1b[<0;10;5Mq"), vec![Event::char('q')]);
    }

    #[test]
    fn sgr_press_and_release() {
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<0;10;5M"),
            vec![mouse(Key::MOUSE_LEFT, Mod::empty(), 9, 4)]
        );
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<0;10;5m"),
            vec![mouse(Key::MOUSE_RELEASE, Mod::empty(), 9, 4)]
        );
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<1;1;1M"),
            vec![mouse(Key::MOUSE_MIDDLE, Mod::empty(), 0, 0)]
        );
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<2;3;4M"),
            vec![mouse(Key::MOUSE_RIGHT, Mod::empty(), 2, 3)]
        );
    }

    #[test]
    fn sgr_wheel() {
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<64;5;5M"),
            vec![mouse(Key::MOUSE_WHEEL_UP, Mod::empty(), 4, 4)]
        );
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<65;5;5M"),
            vec![mouse(Key::MOUSE_WHEEL_DOWN, Mod::empty(), 4, 4)]
        );
        assert_eq!(decode_with(mouse_mode(), b"\x1b[<66;5;5M"), vec![]);
    }

    #[test]
    fn sgr_modifiers_and_motion() {
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<52;7;2M"),
            vec![mouse(Key::MOUSE_LEFT, Mod::SHIFT | Mod::CTRL | Mod::MOTION, 6, 1)]
        );
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<8;1;1M"),
            vec![mouse(Key::MOUSE_LEFT, Mod::ALT, 0, 0)]
        );
    }

    #[test]
    fn sgr_large_coordinates() {
        assert_eq!(
            decode_with(mouse_mode(), b"\x1b[<0;300;120M"),
            vec![mouse(Key::MOUSE_LEFT, Mod::empty(), 299, 119)]
        );
    }

    #[test]
    fn sgr_missing_field_is_invalid() {
        let events = decode_with(mouse_mode(), b"\x1b[<0;5M");
        assert_eq!(events[0], Event::key(Key::ESC));
    }

    #[test]
    fn x10_mouse() {
        // Button 0 at column 10, row 5 (1-based, offset by 32).
        assert_eq!(
            decode_with(mouse_mode(), &[0x1b, b'[', b'M', 32, 32 + 10, 32 + 5]),
            vec![mouse(Key::MOUSE_LEFT, Mod::empty(), 9, 4)]
        );
        assert_eq!(
            decode_with(mouse_mode(), &[0x1b, b'[', b'M', 32 + 3, 33, 33]),
            vec![mouse(Key::MOUSE_RELEASE, Mod::empty(), 0, 0)]
        );
        assert_eq!(
            decode_with(mouse_mode(), &[0x1b, b'[', b'M', 32 + 65, 33, 33]),
            vec![mouse(Key::MOUSE_WHEEL_DOWN, Mod::empty(), 0, 0)]
        );
    }

    #[test]
    fn x10_mouse_incomplete() {
        let mut d = Decoder::new(mouse_mode());
        d.feed(&[0x1b, b'[', b'M', 32, 40]);
        assert_eq!(d.next_event(), None);
        d.feed(&[40]);
        assert_eq!(d.next_event(), Some(mouse(Key::MOUSE_LEFT, Mod::empty(), 7, 7)));
    }

    // ── Mode switching ──────────────────────────────────────────────────

    #[test]
    fn switching_to_esc_drops_pending_alt() {
        let mut d = Decoder::new(InputMode::new(EscapeMode::Alt, false));
        d.feed(b"\x1b");
        assert_eq!(d.flush(), None);
        d.set_mode(InputMode::default());
        d.feed(b"x");
        assert_eq!(d.next_event(), Some(Event::char('x')));
    }

    // ── EventRecord ─────────────────────────────────────────────────────

    #[test]
    fn record_for_char() {
        let rec = EventRecord::from(Event::char('é'));
        assert_eq!(rec.kind, EventType::Key);
        assert_eq!((rec.key, rec.rune, rec.modifiers), (0, 'é' as u32, 0));
        assert_eq!((rec.width, rec.height, rec.x, rec.y), (0, 0, 0, 0));
    }

    #[test]
    fn record_for_key_with_modifiers() {
        let rec = EventRecord::from(key_mod(Key::ARROW_UP, Mod::CTRL | Mod::SHIFT));
        assert_eq!(rec.key, 0xFFFF - 18);
        assert_eq!(rec.rune, 0);
        assert_eq!(rec.modifiers, 6);
    }

    #[test]
    fn record_for_resize_keeps_width_as_columns() {
        let rec = EventRecord::from(Event::Resize { width: 120, height: 40 });
        assert_eq!(rec.kind, EventType::Resize);
        assert_eq!((rec.width, rec.height), (120, 40));
    }

    #[test]
    fn record_for_mouse_keeps_x_as_column() {
        let rec = EventRecord::from(mouse(Key::MOUSE_LEFT, Mod::MOTION, 3, 7));
        assert_eq!(rec.kind, EventType::Mouse);
        assert_eq!((rec.x, rec.y), (3, 7));
        assert_eq!(rec.modifiers, 8);
        assert_eq!(rec.key, Key::MOUSE_LEFT.code());
    }
}
