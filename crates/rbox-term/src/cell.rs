// SPDX-License-Identifier: MIT
//
// Cell: one character position of the terminal grid.
//
// A cell holds a rune plus two display attributes (foreground and
// background). An attribute is a base color (palette index 0–255 or the
// terminal default) combined with style bits. The renderer compares cells
// by value, so everything here is `Copy + Eq` and cheap to compare.
//
// Wide characters (CJK, some emoji) occupy two columns. The first cell
// holds the rune; the second is a continuation cell (ch = 0). The renderer
// never emits continuation cells on their own: it re-emits the lead glyph.
//
// Attributes have a frozen 32-bit wire form so they can be logged,
// serialized, or handed across an FFI boundary without drifting between
// versions:
//
//   bits 0..=8   color code (0 = default, 1..=256 = palette index + 1)
//   bits 16..=22 style flags (bold, underline, reverse, italic, blink,
//                bright, dim)
//
// With that layout BLACK..WHITE encode as 1..=8, the same values the
// classic termbox constant table uses.

use crate::error::{Error, Result};

// ─── Style ───────────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text style flags, combined with bitwise OR.
    ///
    /// ```
    /// use rbox_term::cell::Style;
    ///
    /// let s = Style::BOLD | Style::UNDERLINE;
    /// assert!(s.contains(Style::BOLD));
    /// assert!(!s.contains(Style::ITALIC));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Style: u8 {
        /// SGR 1.
        const BOLD      = 1 << 0;
        /// SGR 4.
        const UNDERLINE = 1 << 1;
        /// SGR 7. Honoured on either the foreground or background attribute.
        const REVERSE   = 1 << 2;
        /// SGR 3.
        const ITALIC    = 1 << 3;
        /// SGR 5.
        const BLINK     = 1 << 4;
        /// Lifts base colors 0–7 to 8–15 in normal output mode. Honoured on
        /// either attribute.
        const BRIGHT    = 1 << 5;
        /// SGR 2.
        const DIM       = 1 << 6;
    }
}

// ─── Color ───────────────────────────────────────────────────────────────────

/// Base color of an attribute.
///
/// How an index is emitted depends on the session's
/// [`OutputMode`](crate::keys::OutputMode): in normal mode only 0–15 are
/// meaningful, in 256-color mode the full range is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Color {
    /// Terminal default color (no SGR color code is sent).
    #[default]
    Default,
    /// Palette index.
    Indexed(u8),
}

impl Color {
    pub const BLACK: Self = Self::Indexed(0);
    pub const RED: Self = Self::Indexed(1);
    pub const GREEN: Self = Self::Indexed(2);
    pub const YELLOW: Self = Self::Indexed(3);
    pub const BLUE: Self = Self::Indexed(4);
    pub const MAGENTA: Self = Self::Indexed(5);
    pub const CYAN: Self = Self::Indexed(6);
    pub const WHITE: Self = Self::Indexed(7);
    /// Palette black. Code 0 is the default color, so callers that think in
    /// raw palette codes reach index 0 through this name.
    pub const HI_BLACK: Self = Self::BLACK;

    /// Frozen numeric code: 0 for default, palette index + 1 otherwise.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Default => 0,
            Self::Indexed(idx) => idx as u16 + 1,
        }
    }

    /// Inverse of [`code`](Self::code). `None` for codes above 256.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Default),
            // 1..=256 guarantees the index fits in u8.
            #[allow(clippy::cast_possible_truncation)]
            1..=256 => Some(Self::Indexed((code - 1) as u8)),
            _ => None,
        }
    }
}

// ─── Attribute ───────────────────────────────────────────────────────────────

const COLOR_MASK: u32 = 0x0000_01FF;
const STYLE_SHIFT: u32 = 16;
const STYLE_MASK: u32 = (Style::all().bits() as u32) << STYLE_SHIFT;

/// A display attribute: base color plus style flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Attribute {
    /// Base color.
    pub color: Color,
    /// Style flags.
    pub style: Style,
}

impl Attribute {
    /// Default color, no style.
    pub const DEFAULT: Self = Self {
        color: Color::Default,
        style: Style::empty(),
    };

    #[inline]
    #[must_use]
    pub const fn new(color: Color, style: Style) -> Self {
        Self { color, style }
    }

    /// Replace the style flags.
    #[inline]
    #[must_use]
    pub const fn with_style(self, style: Style) -> Self {
        Self { style, ..self }
    }

    /// Frozen 32-bit representation (see the module header for the layout).
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.color.code() as u32 | ((self.style.bits() as u32) << STYLE_SHIFT)
    }

    /// Decode the frozen representation.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a reserved bit is set or the color
    /// code is above 256.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !(COLOR_MASK | STYLE_MASK) != 0 {
            return Err(Error::invalid(
                "attribute",
                format!("{bits:#x} sets reserved bits"),
            ));
        }
        // COLOR_MASK keeps 9 bits, always fits u16.
        #[allow(clippy::cast_possible_truncation)]
        let code = (bits & COLOR_MASK) as u16;
        let color = Color::from_code(code)
            .ok_or_else(|| Error::invalid("attribute", format!("color code {code} is above 256")))?;
        #[allow(clippy::cast_possible_truncation)]
        let style = Style::from_bits_truncate((bits >> STYLE_SHIFT) as u8);
        Ok(Self { color, style })
    }
}

impl From<Color> for Attribute {
    #[inline]
    fn from(color: Color) -> Self {
        Self {
            color,
            style: Style::empty(),
        }
    }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// Continuation marker: a cell whose `ch` is 0 belongs to the wide glyph
/// on its left.
const CONTINUATION: u32 = 0;

/// Rune of an empty cell.
const SPACE: u32 = b' ' as u32;

/// A single grid cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Unicode scalar value, or `0` for a continuation cell.
    pub ch: u32,
    /// Foreground attribute.
    pub fg: Attribute,
    /// Background attribute.
    pub bg: Attribute,
}

impl Cell {
    /// Space with default attributes.
    pub const EMPTY: Self = Self {
        ch: SPACE,
        fg: Attribute::DEFAULT,
        bg: Attribute::DEFAULT,
    };

    #[inline]
    #[must_use]
    pub const fn new(ch: char, fg: Attribute, bg: Attribute) -> Self {
        Self {
            ch: ch as u32,
            fg,
            bg,
        }
    }

    /// A space carrying the given attributes (what `clear` fills with).
    #[inline]
    #[must_use]
    pub const fn blank(fg: Attribute, bg: Attribute) -> Self {
        Self { ch: SPACE, fg, bg }
    }

    /// Second column of a wide glyph. Carries the glyph's attributes so the
    /// background stays uniform across the pair.
    #[inline]
    #[must_use]
    pub const fn continuation(fg: Attribute, bg: Attribute) -> Self {
        Self {
            ch: CONTINUATION,
            fg,
            bg,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// A space with default attributes.
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// The rune, or `None` for a continuation cell.
    #[inline]
    #[must_use]
    pub const fn character(self) -> Option<char> {
        if self.ch == CONTINUATION {
            return None;
        }
        char::from_u32(self.ch)
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_continuation() {
            return write!(f, "Cell(continuation)");
        }
        let ch = char::from_u32(self.ch).unwrap_or('?');
        write!(f, "Cell({ch:?}")?;
        if self.fg != Attribute::DEFAULT {
            write!(f, ", fg={:?}", self.fg)?;
        }
        if self.bg != Attribute::DEFAULT {
            write!(f, ", bg={:?}", self.bg)?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
