// SPDX-License-Identifier: MIT
//
// Output buffering and stateful cell writing.
//
//   OutputBuffer accumulates a whole frame in memory so the renderer hands
//   the channel exactly one `write_all` per present.
//
//   CellWriter remembers where the terminal cursor is and which attributes
//   are active, and skips escape sequences that would not change anything.
//   Sequential cells on a row need neither a cursor move nor an SGR.

use std::io::{self, Write};

use crate::ansi;
use crate::cell::{Attribute, Cell};
use crate::keys::OutputMode;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Frame-sized byte buffer. Writing to it never fails.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Write a cell rune as UTF-8. The continuation marker and invalid
    /// scalar values come out as `?`.
    pub fn write_codepoint(&mut self, cp: u32) {
        match char::from_u32(cp).filter(|&ch| ch != '\0') {
            Some(ch) => {
                let mut enc = [0u8; 4];
                self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
            }
            None => self.buf.push(b'?'),
        }
    }

    /// Empty the buffer, keeping its allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── CellWriter ──────────────────────────────────────────────────────────────

/// Tracks terminal cursor and SGR state across a frame.
///
/// - **Cursor**: a move is emitted only when the next glyph does not start
///   where the previous one ended.
/// - **Attributes**: one combined SGR (reset + styles + colors) is emitted
///   whenever the fg/bg pair differs from the last one sent.
pub struct CellWriter {
    /// Where the terminal cursor sits after the last glyph, if known.
    cursor: Option<(u16, u16)>,
    /// Last fg/bg pair sent, if known.
    style: Option<(Attribute, Attribute)>,
    mode: OutputMode,
}

impl CellWriter {
    #[must_use]
    pub const fn new(mode: OutputMode) -> Self {
        Self {
            cursor: None,
            style: None,
            mode,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Change the color mapping. Forgets the active SGR state.
    pub const fn set_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
        self.style = None;
    }

    /// Forget everything. Call after a screen clear, a reset, or whenever
    /// the terminal state is unknown.
    pub const fn reset_state(&mut self) {
        self.cursor = None;
        self.style = None;
    }

    /// Mark the terminal attributes as reset (after an explicit SGR 0).
    pub const fn note_sgr_reset(&mut self) {
        self.style = Some((Attribute::DEFAULT, Attribute::DEFAULT));
    }

    /// Emit one glyph occupying `width` columns at `(x, y)`.
    pub fn put(&mut self, out: &mut OutputBuffer, x: u16, y: u16, cell: &Cell, width: u16) {
        self.move_to(out, x, y);

        let style = (cell.fg, cell.bg);
        if self.style != Some(style) {
            ansi::sgr(out, cell.fg, cell.bg, self.mode).ok();
            self.style = Some(style);
        }

        out.write_codepoint(cell.ch);
        self.cursor = Some((x.saturating_add(width), y));
    }

    /// Move the terminal cursor, skipping the sequence if it is already there.
    pub fn move_to(&mut self, out: &mut OutputBuffer, x: u16, y: u16) {
        if self.cursor != Some((x, y)) {
            ansi::cursor_to(out, x, y).ok();
            self.cursor = Some((x, y));
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
