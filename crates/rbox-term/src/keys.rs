// SPDX-License-Identifier: MIT
//
// Frozen constant tables: key codes, modifiers, event types, and the input
// and output modes.
//
// The numeric values match the classic termbox tables exactly. Hosts that
// bridge to other languages or persist events rely on them, so none of the
// values below may ever change.
//
//   - Special keys count down from 0xFFFF (F1) to 0xFFFF - 28 (wheel down).
//   - Control keys are the raw control byte (0x00..=0x1F), several of them
//     reachable under two or three names (Ctrl+H is Backspace, and so on).
//   - Space is 0x20 and the DEL byte is Backspace2 (0x7F).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─── Key ─────────────────────────────────────────────────────────────────────

/// A non-character key.
///
/// A transparent `u16` carrying the frozen code. Only the constants below
/// exist.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(u16);

const fn special(offset: u16) -> Key {
    Key(0xFFFF - offset)
}

impl Key {
    // ── Function keys ───────────────────────────────────────────────────
    pub const F1: Self = special(0);
    pub const F2: Self = special(1);
    pub const F3: Self = special(2);
    pub const F4: Self = special(3);
    pub const F5: Self = special(4);
    pub const F6: Self = special(5);
    pub const F7: Self = special(6);
    pub const F8: Self = special(7);
    pub const F9: Self = special(8);
    pub const F10: Self = special(9);
    pub const F11: Self = special(10);
    pub const F12: Self = special(11);

    // ── Navigation ──────────────────────────────────────────────────────
    pub const INSERT: Self = special(12);
    pub const DELETE: Self = special(13);
    pub const HOME: Self = special(14);
    pub const END: Self = special(15);
    pub const PGUP: Self = special(16);
    pub const PGDN: Self = special(17);
    pub const ARROW_UP: Self = special(18);
    pub const ARROW_DOWN: Self = special(19);
    pub const ARROW_LEFT: Self = special(20);
    pub const ARROW_RIGHT: Self = special(21);
    pub const BACK_TAB: Self = special(22);

    // ── Mouse ───────────────────────────────────────────────────────────
    pub const MOUSE_LEFT: Self = special(23);
    pub const MOUSE_RIGHT: Self = special(24);
    pub const MOUSE_MIDDLE: Self = special(25);
    pub const MOUSE_RELEASE: Self = special(26);
    pub const MOUSE_WHEEL_UP: Self = special(27);
    pub const MOUSE_WHEEL_DOWN: Self = special(28);

    // ── Control keys ────────────────────────────────────────────────────
    pub const CTRL_TILDE: Self = Self(0x00);
    pub const CTRL_2: Self = Self(0x00);
    pub const CTRL_A: Self = Self(0x01);
    pub const CTRL_B: Self = Self(0x02);
    pub const CTRL_C: Self = Self(0x03);
    pub const CTRL_D: Self = Self(0x04);
    pub const CTRL_E: Self = Self(0x05);
    pub const CTRL_F: Self = Self(0x06);
    pub const CTRL_G: Self = Self(0x07);
    pub const BACKSPACE: Self = Self(0x08);
    pub const CTRL_H: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const CTRL_I: Self = Self(0x09);
    pub const CTRL_J: Self = Self(0x0A);
    pub const CTRL_K: Self = Self(0x0B);
    pub const CTRL_L: Self = Self(0x0C);
    pub const ENTER: Self = Self(0x0D);
    pub const CTRL_M: Self = Self(0x0D);
    pub const CTRL_N: Self = Self(0x0E);
    pub const CTRL_O: Self = Self(0x0F);
    pub const CTRL_P: Self = Self(0x10);
    pub const CTRL_Q: Self = Self(0x11);
    pub const CTRL_R: Self = Self(0x12);
    pub const CTRL_S: Self = Self(0x13);
    pub const CTRL_T: Self = Self(0x14);
    pub const CTRL_U: Self = Self(0x15);
    pub const CTRL_V: Self = Self(0x16);
    pub const CTRL_W: Self = Self(0x17);
    pub const CTRL_X: Self = Self(0x18);
    pub const CTRL_Y: Self = Self(0x19);
    pub const CTRL_Z: Self = Self(0x1A);
    pub const ESC: Self = Self(0x1B);
    pub const CTRL_LSQ_BRACKET: Self = Self(0x1B);
    pub const CTRL_3: Self = Self(0x1B);
    pub const CTRL_4: Self = Self(0x1C);
    pub const CTRL_BACKSLASH: Self = Self(0x1C);
    pub const CTRL_5: Self = Self(0x1D);
    pub const CTRL_RSQ_BRACKET: Self = Self(0x1D);
    pub const CTRL_6: Self = Self(0x1E);
    pub const CTRL_7: Self = Self(0x1F);
    pub const CTRL_SLASH: Self = Self(0x1F);
    pub const CTRL_UNDERSCORE: Self = Self(0x1F);
    pub const SPACE: Self = Self(0x20);
    pub const BACKSPACE2: Self = Self(0x7F);
    pub const CTRL_8: Self = Self(0x7F);

    /// The frozen numeric code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Control key for a raw control byte (`0x00..=0x1F`, `0x7F`).
    #[inline]
    #[must_use]
    pub const fn from_control_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00..=0x1F | 0x7F => Some(Self(byte as u16)),
            _ => None,
        }
    }

    /// Function key `n` (1-based), if it exists.
    #[must_use]
    pub const fn function(n: u8) -> Option<Self> {
        match n {
            1..=12 => Some(special(n as u16 - 1)),
            _ => None,
        }
    }

    /// Whether this is one of the mouse button / wheel codes.
    #[inline]
    #[must_use]
    pub const fn is_mouse(self) -> bool {
        self.0 >= Self::MOUSE_WHEEL_DOWN.0 && self.0 <= Self::MOUSE_LEFT.0
    }

    /// Canonical name (first alias for shared codes).
    #[must_use]
    pub fn name(self) -> &'static str {
        const SPECIAL: [&str; 29] = [
            "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
            "Insert", "Delete", "Home", "End", "PageUp", "PageDown",
            "ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight", "BackTab",
            "MouseLeft", "MouseRight", "MouseMiddle", "MouseRelease",
            "MouseWheelUp", "MouseWheelDown",
        ];
        const CONTROL: [&str; 32] = [
            "CtrlTilde", "CtrlA", "CtrlB", "CtrlC", "CtrlD", "CtrlE", "CtrlF", "CtrlG",
            "Backspace", "Tab", "CtrlJ", "CtrlK", "CtrlL", "Enter", "CtrlN", "CtrlO",
            "CtrlP", "CtrlQ", "CtrlR", "CtrlS", "CtrlT", "CtrlU", "CtrlV", "CtrlW",
            "CtrlX", "CtrlY", "CtrlZ", "Esc", "CtrlBackslash", "CtrlRsqBracket",
            "Ctrl6", "CtrlSlash",
        ];
        match self.0 {
            c @ 0x00..=0x1F => CONTROL[usize::from(c)],
            0x20 => "Space",
            0x7F => "Backspace2",
            c => SPECIAL
                .get(usize::from(0xFFFF - c))
                .copied()
                .unwrap_or("Unknown"),
        }
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key::{}", self.name())
    }
}

// ─── Mod ─────────────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Event modifier flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Mod: u8 {
        const ALT    = 1;
        const CTRL   = 2;
        const SHIFT  = 4;
        /// Mouse moved with a button held.
        const MOTION = 8;
    }
}

// ─── EventType ───────────────────────────────────────────────────────────────

/// Kind tag of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
#[repr(u8)]
pub enum EventType {
    Key = 1,
    Resize = 2,
    Mouse = 3,
}

impl From<EventType> for u8 {
    fn from(t: EventType) -> Self {
        t as Self
    }
}

// ─── InputMode ───────────────────────────────────────────────────────────────

/// What an unmatched ESC turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// A bare Escape key event.
    #[default]
    Esc,
    /// An ALT modifier on the next key.
    Alt,
}

/// Input decoding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct InputMode {
    /// How an unmatched ESC is resolved.
    pub escape: EscapeMode,
    /// Report mouse events.
    pub mouse: bool,
}

impl InputMode {
    pub const ESC_BIT: u8 = 1;
    pub const ALT_BIT: u8 = 2;
    pub const MOUSE_BIT: u8 = 4;

    #[must_use]
    pub const fn new(escape: EscapeMode, mouse: bool) -> Self {
        Self { escape, mouse }
    }

    /// Frozen bit form.
    #[must_use]
    pub const fn bits(self) -> u8 {
        let esc = match self.escape {
            EscapeMode::Esc => Self::ESC_BIT,
            EscapeMode::Alt => Self::ALT_BIT,
        };
        if self.mouse { esc | Self::MOUSE_BIT } else { esc }
    }

    /// Decode the bit form. ESC wins when both ESC and ALT are set, and
    /// ESC is assumed when neither is.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for bits outside the table.
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !(Self::ESC_BIT | Self::ALT_BIT | Self::MOUSE_BIT) != 0 {
            return Err(Error::invalid("input mode", format!("unknown bits {bits:#04x}")));
        }
        let escape = if bits & Self::ALT_BIT != 0 && bits & Self::ESC_BIT == 0 {
            EscapeMode::Alt
        } else {
            EscapeMode::Esc
        };
        Ok(Self {
            escape,
            mouse: bits & Self::MOUSE_BIT != 0,
        })
    }
}

// ─── OutputMode ──────────────────────────────────────────────────────────────

/// How palette colors are mapped to SGR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutputMode {
    /// 8 colors plus bright variants for indexes 8–15.
    #[default]
    #[serde(rename = "normal")]
    Normal = 1,
    /// Full xterm 256-color palette.
    #[serde(rename = "256")]
    Palette256 = 2,
    /// The 6×6×6 color cube, index 0 being its first entry.
    #[serde(rename = "216")]
    Palette216 = 3,
    /// The 24-step gray ramp.
    #[serde(rename = "grayscale")]
    Grayscale = 4,
}

impl OutputMode {
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::Palette256),
            3 => Some(Self::Palette216),
            4 => Some(Self::Grayscale),
            _ => None,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
