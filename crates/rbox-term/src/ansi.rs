// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state
// and no decisions about when to emit; that is the `CellWriter`'s job. This
// module only knows the byte-level encoding of every terminal command the
// engine needs.
//
// Cursor positions are 0-indexed in our API and converted to the 1-indexed
// form ANSI expects.
use std::io::{self, Write};

use crate::cell::{Attribute, Color, Style};
use crate::keys::OutputMode;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` with CUP.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── SGR ─────────────────────────────────────────────────────────────────────

/// SGR parameter for a color, or `None` for the terminal default.
///
/// Normal mode has only the 8 base colors plus their bright variants
/// (indexes 8–15); larger indexes fold onto the base eight. 216 and
/// grayscale modes address sub-ranges of the 256-color palette without an
/// offset, clamping past their last entry.
#[must_use]
pub fn color_param(color: Color, mode: OutputMode, background: bool) -> Option<String> {
    let Color::Indexed(idx) = color else {
        return None;
    };
    let (base, bright, extended) = if background { (40, 100, 48) } else { (30, 90, 38) };
    let idx = u16::from(idx);
    Some(match mode {
        OutputMode::Normal => match idx {
            0..=7 => (base + idx).to_string(),
            8..=15 => (bright + idx - 8).to_string(),
            _ => (base + (idx & 7)).to_string(),
        },
        OutputMode::Palette256 => format!("{extended};5;{idx}"),
        OutputMode::Palette216 => format!("{extended};5;{}", 16 + idx.min(215)),
        OutputMode::Grayscale => format!("{extended};5;{}", 232 + idx.min(23)),
    })
}

/// Base colors lifted to their bright variants, normal mode only.
fn effective_color(attr: Attribute, mode: OutputMode) -> Color {
    match attr.color {
        Color::Indexed(idx @ 0..=7)
            if mode == OutputMode::Normal && attr.style.contains(Style::BRIGHT) =>
        {
            Color::Indexed(idx + 8)
        }
        color => color,
    }
}

/// Emit one SGR sequence that resets and then applies `fg`/`bg`.
///
/// Reverse and bright are honoured on either attribute; the remaining
/// styles come from the foreground only.
pub fn sgr(w: &mut impl Write, fg: Attribute, bg: Attribute, mode: OutputMode) -> io::Result<()> {
    w.write_all(b"\x1b[0")?;

    macro_rules! emit {
        ($set:expr, $code:expr) => {
            if $set {
                w.write_all($code)?;
            }
        };
    }

    emit!(fg.style.contains(Style::BOLD), b";1");
    emit!(fg.style.contains(Style::DIM), b";2");
    emit!(fg.style.contains(Style::ITALIC), b";3");
    emit!(fg.style.contains(Style::UNDERLINE), b";4");
    emit!(fg.style.contains(Style::BLINK), b";5");
    emit!((fg.style | bg.style).contains(Style::REVERSE), b";7");

    if let Some(p) = color_param(effective_color(fg, mode), mode, false) {
        write!(w, ";{p}")?;
    }
    if let Some(p) = color_param(effective_color(bg, mode), mode, true) {
        write!(w, ";{p}")?;
    }
    w.write_all(b"m")
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC Private Mode 2026). Terminals without
/// support ignore it.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

/// End synchronized output; the terminal paints the buffered frame.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Alternate Screen ────────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Leave the alternate screen and restore the original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Mouse Reporting ─────────────────────────────────────────────────────────

/// Enable button and drag reporting, preferring the SGR encoding (1006)
/// with urxvt (1015) as fallback. Terminals that support neither report in
/// X10 form, which the decoder also understands.
pub fn enable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h\x1b[?1002h\x1b[?1015h\x1b[?1006h")
}

/// Disable every mode [`enable_mouse`] turned on.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l\x1b[?1015l\x1b[?1002l\x1b[?1000l")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
