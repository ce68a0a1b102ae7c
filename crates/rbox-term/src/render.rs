// SPDX-License-Identifier: MIT
//
// Damage-driven renderer.
//
// The renderer owns the front buffer (what the terminal is believed to
// show) and turns the back buffer plus its damage set into one block of
// escape sequences. Per present:
//
//   1. Walk the dirty spans in row-major order. Spans are widened so both
//      halves of a wide pair are always looked at together.
//   2. Cells equal to the front buffer are skipped; the rest go through
//      the CellWriter, which drops redundant cursor moves and SGRs.
//   3. The cursor is placed (or hidden) last.
//   4. Everything is wrapped in synchronized-output markers and left in the
//      OutputBuffer. The session writes it with a single `write_all`, then
//      calls `commit` so the front buffer catches up.
//
// A full redraw (first frame, resize, output-mode change, or a failed
// write) starts with SGR reset plus clear-screen and treats the front
// buffer as blank.

use crate::ansi;
use crate::buffer::CellBuffer;
use crate::damage::{Damage, Span};
use crate::keys::OutputMode;
use crate::output::{CellWriter, OutputBuffer};

// ─── CursorState ─────────────────────────────────────────────────────────────

/// Logical cursor: where it should be shown, and whether it is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorState {
    pub x: u16,
    pub y: u16,
    pub visible: bool,
}

impl CursorState {
    /// Hidden cursor (the initial state).
    pub const HIDDEN: Self = Self {
        x: 0,
        y: 0,
        visible: false,
    };

    #[must_use]
    pub const fn at(x: u16, y: u16) -> Self {
        Self { x, y, visible: true }
    }
}

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// What a render pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Glyphs emitted.
    pub cells_rendered: usize,
    /// Dirty cells that already matched the front buffer.
    pub cells_skipped: usize,
    /// Bytes of output generated.
    pub bytes_written: usize,
    /// The pass cleared the screen and repainted everything.
    pub full_redraw: bool,
}

// ─── Renderer ────────────────────────────────────────────────────────────────

pub struct Renderer {
    front: CellBuffer,
    output: OutputBuffer,
    writer: CellWriter,
    full_redraw: bool,
    /// Cursor as last committed to the terminal, `None` when unknown.
    shown_cursor: Option<CursorState>,
    /// Cursor of the pass awaiting `commit`.
    pending_cursor: CursorState,
}

impl Renderer {
    /// A renderer whose first pass is a full redraw.
    #[must_use]
    pub fn new(width: u16, height: u16, mode: OutputMode) -> Self {
        Self {
            front: CellBuffer::new(width, height),
            output: OutputBuffer::new(),
            writer: CellWriter::new(mode),
            full_redraw: true,
            shown_cursor: None,
            pending_cursor: CursorState::HIDDEN,
        }
    }

    /// What the terminal is believed to show.
    #[must_use]
    pub const fn front(&self) -> &CellBuffer {
        &self.front
    }

    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.writer.mode()
    }

    /// Whether the next pass repaints everything.
    #[must_use]
    pub const fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    /// Change the color mapping; the next pass repaints everything.
    pub const fn set_mode(&mut self, mode: OutputMode) {
        self.writer.set_mode(mode);
        self.full_redraw = true;
    }

    /// Forget what the terminal shows. The next pass repaints everything.
    pub const fn invalidate(&mut self) {
        self.full_redraw = true;
        self.shown_cursor = None;
    }

    /// Adopt new dimensions. The next pass repaints everything.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.front.resize(width, height);
        self.invalidate();
    }

    /// Output of the last pass.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        self.output.as_bytes()
    }

    /// Build the escape sequences that bring the terminal from the front
    /// buffer to `back`. Leaves them in [`output`](Self::output); an empty
    /// output means there is nothing to write.
    pub fn render(&mut self, back: &CellBuffer, damage: &Damage, cursor: CursorState) -> RenderStats {
        self.output.clear();
        self.pending_cursor = cursor;

        if (self.front.width(), self.front.height()) != (back.width(), back.height()) {
            self.front.resize(back.width(), back.height());
            self.full_redraw = true;
        }

        let full = self.full_redraw;
        if !full && damage.is_empty() && self.shown_cursor == Some(cursor) {
            return RenderStats::default();
        }

        let mut stats = RenderStats {
            full_redraw: full,
            ..RenderStats::default()
        };

        self.writer.reset_state();
        ansi::begin_sync(&mut self.output).ok();

        if full {
            ansi::reset(&mut self.output).ok();
            ansi::clear_screen(&mut self.output).ok();
            self.writer.note_sgr_reset();
            self.front.clear();
        }

        let width = back.width();
        let rows: Vec<(u16, Span)> = if full || damage.is_all() {
            if width == 0 {
                Vec::new()
            } else {
                (0..back.height()).map(|y| (y, Span::new(0, width - 1))).collect()
            }
        } else {
            damage.iter().collect()
        };

        for (y, span) in rows {
            self.render_span(back, y, span, &mut stats);
        }

        if stats.cells_rendered > 0 {
            ansi::reset(&mut self.output).ok();
        }

        let prev = if full { None } else { self.shown_cursor };
        if cursor.visible {
            self.writer.move_to(&mut self.output, cursor.x, cursor.y);
            if !prev.is_some_and(|c| c.visible) {
                ansi::cursor_show(&mut self.output).ok();
            }
        } else if prev.is_none_or(|c| c.visible) {
            ansi::cursor_hide(&mut self.output).ok();
        }

        ansi::end_sync(&mut self.output).ok();
        stats.bytes_written = self.output.len();
        stats
    }

    /// Record that the last pass reached the terminal.
    pub fn commit(&mut self, back: &CellBuffer) {
        self.front.clone_from(back);
        self.full_redraw = false;
        self.shown_cursor = Some(self.pending_cursor);
        self.output.clear();
    }

    fn render_span(&mut self, back: &CellBuffer, y: u16, span: Span, stats: &mut RenderStats) {
        let (Some(row), Some(prev)) = (back.row(y), self.front.row(y)) else {
            return;
        };
        let width = row.len();
        let mut start = usize::from(span.start);
        let mut end = usize::from(span.end).min(width.saturating_sub(1));

        // Never split a wide pair at the span edges.
        if start > 0 && (row[start].is_continuation() || prev[start].is_continuation()) {
            start -= 1;
        }
        if end + 1 < width && (row[end + 1].is_continuation() || prev[end + 1].is_continuation()) {
            end += 1;
        }

        let mut x = start;
        while x <= end {
            let cell = row[x];
            if cell.is_continuation() {
                // Its lead, one column left, was compared together with it.
                x += 1;
                continue;
            }

            let wide = x + 1 < width && row[x + 1].is_continuation();
            let changed = cell != prev[x] || (wide && row[x + 1] != prev[x + 1]);
            let w: u16 = if wide { 2 } else { 1 };

            if changed {
                // x < width, which came from a u16.
                #[allow(clippy::cast_possible_truncation)]
                self.writer.put(&mut self.output, x as u16, y, &cell, w);
                stats.cells_rendered += 1;
            } else {
                stats.cells_skipped += usize::from(w);
            }
            x += usize::from(w);
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("front", &self.front)
            .field("mode", &self.writer.mode())
            .field("full_redraw", &self.full_redraw)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
